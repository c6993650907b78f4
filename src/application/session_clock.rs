//! SessionClock - schedules proactive token renewal.
//!
//! At most one renewal is pending at a time. Arming always cancels the
//! previous renewal first, and a renewal that was cancelled never fires.
//! The callback only signals that renewal is due; the state machine does the
//! actual refresh on its own task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::auth::Session;
use crate::ports::Clock;

/// Invoked when a scheduled renewal comes due.
pub type RenewalCallback = Arc<dyn Fn() + Send + Sync>;

/// What `arm` did with the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// The session was already inside the refresh margin; the callback ran
    /// synchronously and nothing is pending.
    Immediate,
    /// A renewal fires after the given delay.
    Scheduled(Duration),
}

struct PendingRenewal {
    id: u64,
    task: JoinHandle<()>,
}

pub struct SessionClock {
    clock: Arc<dyn Clock>,
    margin: Duration,
    pending: Arc<Mutex<Option<PendingRenewal>>>,
    next_id: AtomicU64,
}

impl SessionClock {
    pub fn new(clock: Arc<dyn Clock>, margin: Duration) -> Self {
        Self {
            clock,
            margin,
            pending: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Time until renewal is due, or `None` if it is due now.
    ///
    /// Due means `expires_at - now - margin <= 0`.
    pub fn renewal_delay(&self, session: &Session) -> Option<Duration> {
        let margin_ms = i64::try_from(self.margin.as_millis()).unwrap_or(i64::MAX);
        let delay_ms = session
            .expires_at
            .as_unix_millis()
            .saturating_sub(self.clock.now().as_unix_millis())
            .saturating_sub(margin_ms);

        if delay_ms <= 0 {
            None
        } else {
            Some(Duration::from_millis(delay_ms as u64))
        }
    }

    /// Schedules `on_due` for the session's renewal time, replacing any
    /// pending renewal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, session: &Session, on_due: RenewalCallback) -> ArmOutcome {
        self.disarm();

        let Some(delay) = self.renewal_delay(session) else {
            tracing::debug!(
                user_id = %session.user_id(),
                "Session inside refresh margin, renewal due now"
            );
            on_due();
            return ArmOutcome::Immediate;
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::clone(&self.pending);

        // The slot stays locked until the handle is stored, so the task
        // cannot observe the slot before its own entry lands in it.
        let mut pending = lock(&self.pending);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_current = {
                let mut pending = lock(&slot);
                if pending.as_ref().is_some_and(|renewal| renewal.id == id) {
                    pending.take();
                    true
                } else {
                    false
                }
            };
            if still_current {
                on_due();
            }
        });
        *pending = Some(PendingRenewal { id, task });
        drop(pending);

        tracing::debug!(
            user_id = %session.user_id(),
            delay_secs = delay.as_secs(),
            "Token renewal scheduled"
        );
        ArmOutcome::Scheduled(delay)
    }

    /// Cancels the pending renewal. Returns true if one was pending.
    pub fn disarm(&self) -> bool {
        match lock(&self.pending).take() {
            Some(renewal) => {
                renewal.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn lock(pending: &Mutex<Option<PendingRenewal>>) -> MutexGuard<'_, Option<PendingRenewal>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
