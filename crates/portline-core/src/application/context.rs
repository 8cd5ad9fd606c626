//! # Port Context
//!
//! Collaborators injected into every generator and reader.

use crate::config::PortProtocolConfig;
use crate::ports::{
    ConnectionStore, CryptoCollaborator, InitialInfoExchange, NotificationService,
    PermissionStore, PortLifecycleStore, ProfileProvider, RemoteIssuer,
};
use std::sync::Arc;

/// Shared handles to the protocol's collaborators.
#[derive(Clone)]
pub struct PortContext {
    /// Protocol configuration.
    pub config: Arc<PortProtocolConfig>,
    /// Remote issuer.
    pub issuer: Arc<dyn RemoteIssuer>,
    /// Generated/read record persistence.
    pub store: Arc<dyn PortLifecycleStore>,
    /// Crypto sessions.
    pub crypto: Arc<dyn CryptoCollaborator>,
    /// Chats, contacts and lines.
    pub connections: Arc<dyn ConnectionStore>,
    /// Permission sets.
    pub permissions: Arc<dyn PermissionStore>,
    /// Notification settings.
    pub notifications: Arc<dyn NotificationService>,
    /// Post-connection messages.
    pub info: Arc<dyn InitialInfoExchange>,
    /// Own profile.
    pub profile: Arc<dyn ProfileProvider>,
}
