//! # Accepted Contact Port (1.0.0)
//!
//! The contact side of a contact port: the owner's published key material,
//! kept so this user can pass the port on. Each bundle minted from it
//! carries a fresh ticket announced to the owner over the chat line.

use super::{delete_owned, resolve_shareable_link};
use crate::application::context::PortContext;
use crate::domain::{
    clip_name, AcceptedContactPortRecord, Bundle, ContactPortMaterial, CorrelationKey,
    GeneratedPort, PairHash, PeerBundle, PortError, PortKind, PortResult, TicketId,
    LATEST_VERSION, ORG_NAME,
};
use crate::metrics;
use crate::ports::PortGenerator;
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use tracing::{info, warn};

/// Accepted contact port, version 1.0.0.
pub struct AcceptedContactPortV1 {
    ctx: PortContext,
    record: AcceptedContactPortRecord,
}

fn new_ticket_id() -> TicketId {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl AcceptedContactPortV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Store the owner's contact port, replacing any previous one from the
    /// same owner.
    pub async fn create(ctx: &PortContext, pair_hash: PairHash, bundle: PeerBundle) -> PortResult<Self> {
        if bundle.target != PortKind::ContactPort {
            return Err(PortError::Validation(format!(
                "expected a contact port bundle, got {}",
                bundle.target
            )));
        }
        if bundle.version != Self::VERSION {
            return Err(PortError::UnsupportedVersion {
                kind: PortKind::ContactPort,
                version: Some(bundle.version),
            });
        }
        let pubkey = bundle
            .pubkey
            .clone()
            .ok_or_else(|| PortError::Validation("contact port bundle has no pubkey".to_string()))?;

        let key = CorrelationKey::AcceptedContactPort(pair_hash.clone());
        if let Some(GeneratedPort::AcceptedContactPort(previous)) = ctx.store.find_generated(&key).await? {
            info!(pair_hash = %pair_hash, port_id = %previous.port_id, "[portline] replacing accepted contact port");
            Self::load(ctx, previous).clean().await;
        }

        let crypto_id = ctx
            .crypto
            .create_contact_port_session(&ContactPortMaterial {
                pubkey,
                rad: bundle.rad.clone(),
                key_hash: bundle.key_hash.clone(),
            })
            .await?;
        let record = AcceptedContactPortRecord {
            port_id: bundle.port_id,
            version: Self::VERSION.to_string(),
            pair_hash,
            crypto_id,
            created_on: Utc::now(),
            cached_bundle: None,
            bundle_id: None,
        };
        if let Err(e) = ctx
            .store
            .save_generated(GeneratedPort::AcceptedContactPort(record.clone()))
            .await
        {
            delete_owned(ctx, Some(&record.crypto_id), None).await;
            return Err(e);
        }

        metrics::record_port_created(PortKind::ContactPort);
        info!(port_id = %record.port_id, pair_hash = %record.pair_hash, "[portline] contact port accepted");
        Ok(Self::load(ctx, record))
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: AcceptedContactPortRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    /// Typed record.
    pub fn data(&self) -> &AcceptedContactPortRecord {
        &self.record
    }

    async fn persist(&self) -> PortResult<()> {
        self.ctx
            .store
            .save_generated(GeneratedPort::AcceptedContactPort(self.record.clone()))
            .await
    }

    /// Announce a fresh ticket to the owner over the chat line.
    async fn mint_ticket(&self) -> PortResult<TicketId> {
        let chat = self
            .ctx
            .connections
            .chat_for_pair_hash(&self.record.pair_hash)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("chat with {}", self.record.pair_hash)))?;
        let crypto_id = self
            .ctx
            .connections
            .get_line(&chat.line_id)
            .await?
            .and_then(|line| line.crypto_id)
            .ok_or_else(|| PortError::NotFound(format!("session of line {}", chat.line_id)))?;

        let ticket = new_ticket_id();
        let payload = serde_json::json!({
            "type": "contactPortTicket",
            "portId": self.record.port_id,
            "ticket": ticket,
        })
        .to_string();
        let encrypted = self.ctx.crypto.encrypt(&crypto_id, &payload).await?;
        self.ctx
            .issuer
            .create_contact_port_ticket(&self.record.port_id, &ticket, &chat.line_id, &encrypted)
            .await?;
        Ok(ticket)
    }
}

#[async_trait]
impl PortGenerator for AcceptedContactPortV1 {
    fn kind(&self) -> PortKind {
        PortKind::ContactPort
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn port_id(&self) -> &str {
        &self.record.port_id
    }

    fn record(&self) -> GeneratedPort {
        GeneratedPort::AcceptedContactPort(self.record.clone())
    }

    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle> {
        let ticket = self.mint_ticket().await?;
        let material = self
            .ctx
            .crypto
            .get_contact_port_material(&self.record.crypto_id)
            .await?;
        let name = self
            .ctx
            .connections
            .get_contact(&self.record.pair_hash)
            .await?
            .map(|contact| clip_name(&contact.name))
            .filter(|name| !name.is_empty());
        let bundle = PeerBundle {
            port_id: self.record.port_id.clone(),
            version: self.record.version.clone(),
            org: ORG_NAME.to_string(),
            target: PortKind::ContactPort,
            name,
            rad: material.rad,
            key_hash: material.key_hash,
            pubkey: Some(material.pubkey),
            ticket: Some(ticket),
            expiry_timestamp: None,
        };

        self.record.cached_bundle = Some(bundle.clone());
        self.record.bundle_id = None;
        if let Err(e) = self.persist().await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to cache minted bundle");
        }
        Ok(Bundle::Peer(bundle))
    }

    async fn get_shareable_link(&mut self) -> PortResult<String> {
        let bundle = self.get_shareable_bundle().await?;
        let resolved = resolve_shareable_link(&self.ctx, None, &bundle, false).await?;
        if let Some(bundle_id) = resolved.minted {
            self.record.bundle_id = Some(bundle_id);
            if let Err(e) = self.persist().await {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to cache bundle id");
            }
        }
        Ok(resolved.link)
    }

    async fn clean(&mut self) {
        if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete accepted contact port");
        }
        delete_owned(&self.ctx, Some(&self.record.crypto_id), None).await;
    }
}
