//! SubscriptionBridge - realtime profile-change channels for the signed-in user.
//!
//! Holds at most one channel per user. Pushed changes are filtered down to
//! inserts and updates of that user's row before reaching the callback.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use crate::domain::auth::AuthError;
use crate::domain::foundation::{ChannelId, UserId};
use crate::domain::profile::UserProfile;
use crate::ports::{ChangeKind, ProfileChange, ProfileChangeHandler, RealtimeTransport};

/// Receives the new profile record of a pushed change.
pub type ProfileCallback = Arc<dyn Fn(UserProfile) + Send + Sync>;

pub struct SubscriptionBridge {
    transport: Arc<dyn RealtimeTransport>,
    channels: Mutex<HashMap<UserId, ChannelId>>,
}

impl SubscriptionBridge {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            transport,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a channel for `user_id`, replacing any channel already open for
    /// the same user.
    pub async fn subscribe(
        &self,
        user_id: &UserId,
        on_change: ProfileCallback,
    ) -> Result<ChannelId, AuthError> {
        let mut channels = self.channels.lock().await;

        if let Some(previous) = channels.remove(user_id) {
            if let Err(e) = self.transport.unsubscribe(previous).await {
                tracing::warn!(user_id = %user_id, channel = %previous, "Failed to close replaced channel: {}", e);
            }
        }

        let handler = filtered_handler(user_id.clone(), on_change);
        let channel = self
            .transport
            .subscribe_to_user_updates(user_id, handler)
            .await?;
        channels.insert(user_id.clone(), channel);

        tracing::debug!(user_id = %user_id, channel = %channel, "Opened profile channel");
        Ok(channel)
    }

    /// Closes every open channel. Returns how many closed cleanly.
    ///
    /// Close failures are logged; the channel is forgotten either way.
    pub async fn unsubscribe_all(&self) -> usize {
        let drained: Vec<(UserId, ChannelId)> = self.channels.lock().await.drain().collect();
        if drained.is_empty() {
            return 0;
        }

        let results = join_all(
            drained
                .iter()
                .map(|(_, channel)| self.transport.unsubscribe(*channel)),
        )
        .await;

        let mut closed = 0;
        for ((user_id, channel), result) in drained.iter().zip(results) {
            match result {
                Ok(()) => closed += 1,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, channel = %channel, "Failed to close channel: {}", e)
                }
            }
        }
        closed
    }

    pub async fn open_channels(&self) -> usize {
        self.channels.lock().await.len()
    }
}

fn filtered_handler(user_id: UserId, on_change: ProfileCallback) -> ProfileChangeHandler {
    Arc::new(move |change: ProfileChange| {
        if change.user_id != user_id {
            return;
        }
        match (change.kind, change.record) {
            (ChangeKind::Insert | ChangeKind::Update, Some(profile)) if profile.id == user_id => {
                on_change(profile)
            }
            (kind, _) => {
                tracing::debug!(user_id = %user_id, ?kind, "Ignoring profile change without usable record")
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::realtime::InMemoryRealtimeTransport;
    use crate::domain::foundation::Timestamp;
    use crate::ports::RealtimeError;
    use std::sync::Mutex as StdMutex;

    fn profile(id: &str) -> UserProfile {
        UserProfile::new_default(
            UserId::new(id).unwrap(),
            format!("{}@example.com", id),
            Timestamp::from_unix_secs(1_700_000_000),
        )
    }

    fn collector() -> (Arc<StdMutex<Vec<UserProfile>>>, ProfileCallback) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Arc::new(move |p| sink.lock().unwrap().push(p)))
    }

    #[tokio::test]
    async fn forwards_updates_for_subscribed_user() {
        let transport = Arc::new(InMemoryRealtimeTransport::new());
        let bridge = SubscriptionBridge::new(transport.clone());
        let (seen, callback) = collector();
        let alice = profile("alice");

        bridge.subscribe(&alice.id, callback).await.unwrap();
        transport.push_profile_update(alice.clone());

        assert_eq!(*seen.lock().unwrap(), vec![alice]);
    }

    #[tokio::test]
    async fn ignores_deletes_and_missing_records() {
        let transport = Arc::new(InMemoryRealtimeTransport::new());
        let bridge = SubscriptionBridge::new(transport.clone());
        let (seen, callback) = collector();
        let alice = profile("alice");
        bridge.subscribe(&alice.id, callback).await.unwrap();

        transport.push(ProfileChange {
            user_id: alice.id.clone(),
            kind: ChangeKind::Delete,
            record: Some(alice.clone()),
        });
        transport.push(ProfileChange {
            user_id: alice.id.clone(),
            kind: ChangeKind::Update,
            record: None,
        });

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resubscribing_same_user_replaces_channel() {
        let transport = Arc::new(InMemoryRealtimeTransport::new());
        let bridge = SubscriptionBridge::new(transport.clone());
        let (first, first_cb) = collector();
        let (second, second_cb) = collector();
        let alice = profile("alice");

        let a = bridge.subscribe(&alice.id, first_cb).await.unwrap();
        let b = bridge.subscribe(&alice.id, second_cb).await.unwrap();
        transport.push_profile_update(alice.clone());

        assert_ne!(a, b);
        assert_eq!(transport.channels_for(&alice.id), 1);
        assert_eq!(bridge.open_channels().await, 1);
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_all_closes_everything() {
        let transport = Arc::new(InMemoryRealtimeTransport::new());
        let bridge = SubscriptionBridge::new(transport.clone());
        let (_, callback) = collector();

        bridge
            .subscribe(&UserId::new("alice").unwrap(), callback.clone())
            .await
            .unwrap();
        bridge
            .subscribe(&UserId::new("bob").unwrap(), callback)
            .await
            .unwrap();

        assert_eq!(bridge.unsubscribe_all().await, 2);
        assert_eq!(transport.open_channel_count(), 0);
        assert_eq!(bridge.open_channels().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_all_with_no_channels_is_noop() {
        let bridge = SubscriptionBridge::new(Arc::new(InMemoryRealtimeTransport::new()));
        assert_eq!(bridge.unsubscribe_all().await, 0);
    }

    #[tokio::test]
    async fn subscribe_failure_is_remote_failure() {
        let transport = Arc::new(
            InMemoryRealtimeTransport::new()
                .with_error(RealtimeError::ConnectionFailed("socket closed".into())),
        );
        let bridge = SubscriptionBridge::new(transport);
        let (_, callback) = collector();

        let result = bridge
            .subscribe(&UserId::new("alice").unwrap(), callback)
            .await;

        assert!(matches!(result, Err(AuthError::RemoteFailure(_))));
        assert_eq!(bridge.open_channels().await, 0);
    }
}
