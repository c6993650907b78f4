//! In-memory realtime transport.
//!
//! Channels are keyed by `ChannelId`; pushing a change invokes the handler of
//! every channel subscribed to that user. Handlers are cloned out of the
//! registry before being called so a handler may itself (un)subscribe.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use crate::domain::foundation::{ChannelId, UserId};
use crate::domain::profile::UserProfile;
use crate::ports::{
    ChangeKind, ProfileChange, ProfileChangeHandler, RealtimeError, RealtimeTransport,
};

struct Channel {
    user_id: UserId,
    handler: ProfileChangeHandler,
}

#[derive(Default)]
pub struct InMemoryRealtimeTransport {
    channels: RwLock<HashMap<ChannelId, Channel>>,
    force_error: Mutex<Option<RealtimeError>>,
    opened_total: Mutex<usize>,
}

impl InMemoryRealtimeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent subscribes fail.
    pub fn with_error(self, error: RealtimeError) -> Self {
        *self.force_error.lock().unwrap() = Some(error);
        self
    }

    /// Number of currently open channels.
    pub fn open_channel_count(&self) -> usize {
        self.channels.read().unwrap().len()
    }

    /// Number of open channels for one user.
    pub fn channels_for(&self, user_id: &UserId) -> usize {
        self.channels
            .read()
            .unwrap()
            .values()
            .filter(|channel| &channel.user_id == user_id)
            .count()
    }

    /// Number of channels ever opened.
    pub fn opened_total(&self) -> usize {
        *self.opened_total.lock().unwrap()
    }

    /// Delivers a change to every channel of `change.user_id`.
    ///
    /// Returns the number of handlers invoked.
    pub fn push(&self, change: ProfileChange) -> usize {
        let handlers: Vec<ProfileChangeHandler> = self
            .channels
            .read()
            .unwrap()
            .values()
            .filter(|channel| channel.user_id == change.user_id)
            .map(|channel| channel.handler.clone())
            .collect();

        for handler in &handlers {
            handler(change.clone());
        }
        handlers.len()
    }

    /// Convenience for pushing an update of a profile row.
    pub fn push_profile_update(&self, profile: UserProfile) -> usize {
        self.push(ProfileChange {
            user_id: profile.id.clone(),
            kind: ChangeKind::Update,
            record: Some(profile),
        })
    }
}

#[async_trait]
impl RealtimeTransport for InMemoryRealtimeTransport {
    async fn subscribe_to_user_updates(
        &self,
        user_id: &UserId,
        handler: ProfileChangeHandler,
    ) -> Result<ChannelId, RealtimeError> {
        if let Some(error) = self.force_error.lock().unwrap().clone() {
            return Err(error);
        }

        let channel_id = ChannelId::new();
        self.channels.write().unwrap().insert(
            channel_id,
            Channel {
                user_id: user_id.clone(),
                handler,
            },
        );
        *self.opened_total.lock().unwrap() += 1;
        Ok(channel_id)
    }

    async fn unsubscribe(&self, channel: ChannelId) -> Result<(), RealtimeError> {
        self.channels
            .write()
            .unwrap()
            .remove(&channel)
            .map(|_| ())
            .ok_or(RealtimeError::UnknownChannel(channel))
    }
}
