//! ListenerRegistry - fan-out of auth state snapshots to subscribers.
//!
//! Subscribers receive the current snapshot immediately on subscribe and
//! every published snapshot afterwards, in registration order. A panicking
//! listener is logged and skipped; it never prevents delivery to the others.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::domain::auth::AuthState;

/// Callback invoked with each published snapshot.
pub type AuthStateListener = Arc<dyn Fn(&Arc<AuthState>) + Send + Sync>;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct RegistryInner {
    current: Arc<AuthState>,
    listeners: Vec<(ListenerId, AuthStateListener)>,
    next_id: u64,
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle does not unsubscribe; call `unsubscribe` explicitly.
pub struct Subscription {
    id: ListenerId,
    registry: Weak<Mutex<RegistryInner>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the listener. Returns false if it was already removed.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(inner) => remove_listener(&inner, self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Holds the current snapshot and the set of listeners.
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub fn new(initial: Arc<AuthState>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                current: initial,
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> Arc<AuthState> {
        Arc::clone(&lock(&self.inner).current)
    }

    /// Registers a listener and immediately delivers the current snapshot.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<AuthState>) + Send + Sync + 'static,
    {
        let listener: AuthStateListener = Arc::new(listener);
        let (id, snapshot) = {
            let mut inner = lock(&self.inner);
            let id = ListenerId(inner.next_id);
            inner.next_id += 1;
            inner.listeners.push((id, Arc::clone(&listener)));
            (id, Arc::clone(&inner.current))
        };

        deliver(id, &listener, &snapshot);

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a listener by id.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        remove_listener(&self.inner, id)
    }

    /// Records `snapshot` as current and notifies every listener.
    ///
    /// Listeners run outside the registry lock, so they may subscribe,
    /// unsubscribe or read `current` re-entrantly. Returns the number of
    /// listeners that completed without panicking.
    pub fn publish(&self, snapshot: Arc<AuthState>) -> usize {
        let listeners = {
            let mut inner = lock(&self.inner);
            inner.current = Arc::clone(&snapshot);
            inner.listeners.clone()
        };

        listeners
            .iter()
            .filter(|(id, listener)| deliver(*id, listener, &snapshot))
            .count()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    // Listeners never run under the lock, so a poisoned lock still holds
    // consistent data.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remove_listener(inner: &Mutex<RegistryInner>, id: ListenerId) -> bool {
    let mut inner = lock(inner);
    let before = inner.listeners.len();
    inner.listeners.retain(|(existing, _)| *existing != id);
    inner.listeners.len() != before
}

fn deliver(id: ListenerId, listener: &AuthStateListener, snapshot: &Arc<AuthState>) -> bool {
    match catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                listener_id = id.0,
                panic = %panic_message(payload.as_ref()),
                "Auth state listener panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> ListenerRegistry {
        ListenerRegistry::new(Arc::new(AuthState::initial()))
    }

    fn recorder() -> (Arc<Mutex<Vec<Arc<AuthState>>>>, impl Fn(&Arc<AuthState>) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |state: &Arc<AuthState>| {
            sink.lock().unwrap().push(Arc::clone(state))
        })
    }

    #[test]
    fn subscribe_delivers_current_snapshot_immediately() {
        let registry = registry();
        let (seen, listener) = recorder();

        registry.subscribe(listener);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(!seen[0].is_initialized());
    }

    #[test]
    fn publish_updates_current_and_notifies() {
        let registry = registry();
        let (seen, listener) = recorder();
        registry.subscribe(listener);

        let anonymous = Arc::new(AuthState::anonymous());
        let delivered = registry.publish(Arc::clone(&anonymous));

        assert_eq!(delivered, 1);
        assert!(Arc::ptr_eq(&registry.current(), &anonymous));
        assert!(Arc::ptr_eq(&seen.lock().unwrap()[1], &anonymous));
    }

    #[test]
    fn listeners_are_notified_in_registration_order() {
        let registry = registry();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            registry.subscribe(move |_| order.lock().unwrap().push(n));
        }
        order.lock().unwrap().clear();

        registry.publish(Arc::new(AuthState::anonymous()));

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = registry();
        let calls = Arc::new(AtomicUsize::new(0));

        let armed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let trip = Arc::clone(&armed);
        registry.subscribe(move |_| {
            if trip.load(Ordering::SeqCst) {
                panic!("listener failure");
            }
        });
        let counter = Arc::clone(&calls);
        registry.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        armed.store(true, Ordering::SeqCst);
        let delivered = registry.publish(Arc::new(AuthState::anonymous()));

        assert_eq!(delivered, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = registry();
        let (seen, listener) = recorder();
        let subscription = registry.subscribe(listener);

        assert!(subscription.unsubscribe());
        registry.publish(Arc::new(AuthState::anonymous()));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribe_by_id_is_idempotent() {
        let registry = registry();
        let subscription = registry.subscribe(|_| {});
        let id = subscription.id();

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn listener_may_read_current_reentrantly() {
        let registry = Arc::new(registry());
        let inner = Arc::clone(&registry);
        let observed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&observed);

        registry.subscribe(move |state| {
            assert!(Arc::ptr_eq(&inner.current(), state));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registry.publish(Arc::new(AuthState::anonymous()));

        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }
}
