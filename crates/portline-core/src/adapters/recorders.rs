//! # Recording Senders
//!
//! Post-connection collaborators that only record what they were asked to
//! send.

use crate::domain::{ChatId, LineId, PortError, PortResult};
use crate::ports::{InitialInfoExchange, NotificationService, ProfileProvider};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Records notification permission changes.
#[derive(Default)]
pub struct RecordingNotifier {
    applied: RwLock<Vec<(ChatId, bool)>>,
    failure: RwLock<Option<PortError>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applied permissions, oldest first.
    pub fn applied(&self) -> Vec<(ChatId, bool)> {
        self.applied.read().clone()
    }

    /// Make every future call fail with `err`.
    pub fn fail(&self, err: PortError) {
        *self.failure.write() = Some(err);
    }

    /// Stop failing calls.
    pub fn recover(&self) {
        *self.failure.write() = None;
    }
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn apply_notification_permission(
        &self,
        chat_id: &ChatId,
        enabled: bool,
    ) -> PortResult<()> {
        if let Some(err) = self.failure.read().clone() {
            return Err(err);
        }
        self.applied.write().push((chat_id.clone(), enabled));
        Ok(())
    }
}

/// Which side sent an initial info exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoSide {
    /// Port owner.
    Generator,
    /// Bundle consumer.
    Reader,
}

/// Records initial info exchanges and shared-bundle acceptances.
#[derive(Default)]
pub struct RecordingInfoExchange {
    sent: RwLock<Vec<(InfoSide, ChatId, LineId)>>,
    accepted: RwLock<Vec<(ChatId, String)>>,
}

impl RecordingInfoExchange {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchanges sent, oldest first.
    pub fn sent(&self) -> Vec<(InfoSide, ChatId, LineId)> {
        self.sent.read().clone()
    }

    /// Shared bundles marked accepted.
    pub fn accepted_bundles(&self) -> Vec<(ChatId, String)> {
        self.accepted.read().clone()
    }
}

#[async_trait]
impl InitialInfoExchange for RecordingInfoExchange {
    async fn send_generator_info(&self, chat_id: &ChatId, line_id: &LineId) -> PortResult<()> {
        self.sent
            .write()
            .push((InfoSide::Generator, chat_id.clone(), line_id.clone()));
        Ok(())
    }

    async fn send_reader_info(&self, chat_id: &ChatId, line_id: &LineId) -> PortResult<()> {
        self.sent
            .write()
            .push((InfoSide::Reader, chat_id.clone(), line_id.clone()));
        Ok(())
    }

    async fn mark_shared_bundle_accepted(
        &self,
        chat_id: &ChatId,
        message_id: &str,
    ) -> PortResult<()> {
        self.accepted
            .write()
            .push((chat_id.clone(), message_id.to_string()));
        Ok(())
    }
}

/// Fixed display name.
pub struct StaticProfile {
    name: String,
}

impl StaticProfile {
    /// Profile with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ProfileProvider for StaticProfile {
    async fn own_name(&self) -> PortResult<String> {
        Ok(self.name.clone())
    }
}
