//! # Test Support
//!
//! A `User` is one backend plus the service on top of it. Users created
//! through the same `Network` share an issuer, so a line one user requests
//! can be relayed to the generator of another.

use portline_core::domain::Chat;
use portline_core::{
    ConnectionRequest, ConnectionStore, InMemoryBackend, InMemoryIssuer, PortKind,
    PortProtocolApi, PortProtocolConfig, PortResult, PortService,
};
use std::sync::Arc;

/// Users sharing one issuer.
pub struct Network {
    /// The shared issuer.
    pub issuer: Arc<InMemoryIssuer>,
}

/// One user of the network.
pub struct User {
    /// Backend handles for inspection.
    pub backend: InMemoryBackend,
    /// Service driving the protocol.
    pub service: PortService,
}

impl Network {
    /// Empty network.
    pub fn new() -> Self {
        Self {
            issuer: Arc::new(InMemoryIssuer::default()),
        }
    }

    /// Add a user. Must run inside a tokio runtime.
    pub fn user(&self, name: &str) -> User {
        let backend = InMemoryBackend::with_issuer(name, self.issuer.clone());
        let service = PortService::new(backend.context(PortProtocolConfig::for_testing()));
        User { backend, service }
    }

    /// Next line formation makes the reader see its peer as `reader_sees`.
    pub fn expect_line(&self, line_id: &str, reader_sees: &str) {
        self.issuer.queue_line_grant(line_id, reader_sees);
    }

    /// The issuer notification for the latest line request, as the
    /// generator receives it. `generator_sees` is the reader's pair hash on
    /// the generator's side.
    pub fn last_notification(&self, generator_sees: &str) -> Option<(PortKind, String, ConnectionRequest)> {
        let request = self.issuer.line_requests().pop()?;
        Some((
            request.kind,
            request.port_id,
            ConnectionRequest {
                line_id: request.grant.line_id,
                pair_hash: generator_sees.to_string(),
                intro: request.intro,
            },
        ))
    }

    /// Relay the latest line request to its generator.
    pub async fn relay(&self, generator: &User, generator_sees: &str) -> PortResult<()> {
        let (kind, port_id, request) = self
            .last_notification(generator_sees)
            .expect("no line request to relay");
        generator
            .service
            .on_line_created(kind, &port_id, &request)
            .await
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl User {
    /// Direct chat with a peer, if any.
    pub async fn chat_with(&self, pair_hash: &str) -> Option<Chat> {
        self.backend
            .connections
            .chat_for_pair_hash(&pair_hash.to_string())
            .await
            .expect("connection store failed")
    }

    /// Read a bundle and sweep immediately.
    pub async fn scan(&self, raw: &str) -> PortResult<()> {
        self.service.try_read_bundle(raw, None, None).await?;
        self.service.process_read_bundles().await?;
        Ok(())
    }
}
