//! # Adapters Module
//!
//! Reference implementations of every outbound port. They make the protocol
//! runnable end to end in tests and in the admin tool.

pub mod memory_connections;
pub mod memory_issuer;
pub mod memory_store;
pub mod recorders;
pub mod session_vault;

pub use memory_connections::{InMemoryConnectionStore, InMemoryPermissionStore};
pub use memory_issuer::{InMemoryIssuer, IssuerCall, LineRequest};
pub use memory_store::InMemoryPortStore;
pub use recorders::{InfoSide, RecordingInfoExchange, RecordingNotifier, StaticProfile};
pub use session_vault::SessionVault;

use crate::application::PortContext;
use crate::config::PortProtocolConfig;
use std::sync::Arc;

/// One user's in-memory backend, with typed handles for inspection.
#[derive(Clone)]
pub struct InMemoryBackend {
    /// Issuer.
    pub issuer: Arc<InMemoryIssuer>,
    /// Lifecycle store.
    pub store: Arc<InMemoryPortStore>,
    /// Crypto sessions.
    pub crypto: Arc<SessionVault>,
    /// Chats, contacts and lines.
    pub connections: Arc<InMemoryConnectionStore>,
    /// Permission sets.
    pub permissions: Arc<InMemoryPermissionStore>,
    /// Notification recorder.
    pub notifications: Arc<RecordingNotifier>,
    /// Info exchange recorder.
    pub info: Arc<RecordingInfoExchange>,
    /// Profile.
    pub profile: Arc<StaticProfile>,
}

impl InMemoryBackend {
    /// Backend with its own issuer.
    pub fn new(name: &str) -> Self {
        Self::with_issuer(name, Arc::new(InMemoryIssuer::default()))
    }

    /// Backend sharing an issuer with other users.
    pub fn with_issuer(name: &str, issuer: Arc<InMemoryIssuer>) -> Self {
        Self {
            issuer,
            store: Arc::new(InMemoryPortStore::new()),
            crypto: Arc::new(SessionVault::new()),
            connections: Arc::new(InMemoryConnectionStore::new()),
            permissions: Arc::new(InMemoryPermissionStore::new()),
            notifications: Arc::new(RecordingNotifier::new()),
            info: Arc::new(RecordingInfoExchange::new()),
            profile: Arc::new(StaticProfile::new(name)),
        }
    }

    /// Context wired to this backend.
    pub fn context(&self, config: PortProtocolConfig) -> PortContext {
        PortContext {
            config: Arc::new(config),
            issuer: self.issuer.clone(),
            store: self.store.clone(),
            crypto: self.crypto.clone(),
            connections: self.connections.clone(),
            permissions: self.permissions.clone(),
            notifications: self.notifications.clone(),
            info: self.info.clone(),
            profile: self.profile.clone(),
        }
    }
}
