//! # Port Service
//!
//! Facade over the registry, generators and readers: bundle intake, issuer
//! notification dispatch, the pending-bundle sweep, expiry cleanup and port
//! listing.

use super::context::PortContext;
use super::generators::shared_contact_port::set_contact_sharing;
use super::readers::clean_read;
use super::registry::BundleVersionRegistry;
use super::sweep::ReadBundleSweeper;
use crate::algorithms::{parse_link, ParsedLink};
use crate::domain::{
    ChatId, ConnectionRequest, CorrelationKey, FolderId, GeneratedPort, Permissions, PortError,
    PortId, PortKind, PortResult, PortSummary, ReadPortRecord, SweepReport, TicketId,
};
use crate::ports::{CreatePortRequest, PortGenerator, PortProtocolApi};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Port protocol facade.
#[derive(Clone)]
pub struct PortService {
    ctx: PortContext,
    registry: Arc<BundleVersionRegistry>,
    sweeper: ReadBundleSweeper,
}

impl PortService {
    /// Service with every 1.0.0 implementation registered.
    ///
    /// Must be called inside a tokio runtime: the sweep worker is spawned
    /// here.
    pub fn new(ctx: PortContext) -> Self {
        Self::with_registry(ctx, BundleVersionRegistry::with_defaults())
    }

    /// Service with a custom registry.
    pub fn with_registry(ctx: PortContext, registry: BundleVersionRegistry) -> Self {
        let registry = Arc::new(registry);
        let sweeper = ReadBundleSweeper::spawn(ctx.clone(), registry.clone());
        Self {
            ctx,
            registry,
            sweeper,
        }
    }

    /// Injected collaborators.
    pub fn context(&self) -> &PortContext {
        &self.ctx
    }

    /// Version registry.
    pub fn registry(&self) -> &BundleVersionRegistry {
        &self.registry
    }

    /// Create a port, or log and return `None`.
    pub async fn create_port(&self, request: CreatePortRequest) -> Option<Box<dyn PortGenerator>> {
        self.registry.create_generator(&self.ctx, request).await
    }

    /// Read a scanned bundle, or log and return `None`.
    pub async fn read_bundle(
        &self,
        raw: &str,
        channel: Option<String>,
        folder_id: Option<FolderId>,
    ) -> Option<ReadPortRecord> {
        match self.try_read_bundle(raw, channel, folder_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "[portline] failed to read bundle");
                None
            }
        }
    }

    /// Generator of a stored port.
    pub async fn load_port(&self, port_id: &PortId) -> PortResult<Box<dyn PortGenerator>> {
        let record = self
            .ctx
            .store
            .get_generated(port_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("port {}", port_id)))?;
        self.registry.load_generator(&self.ctx, record)
    }

    /// Mark a group port used.
    pub async fn consume_group_port(&self, port_id: &PortId) -> PortResult<()> {
        self.load_port(port_id).await?.consume().await
    }

    /// Pause a multi-use port.
    pub async fn pause_port(&self, port_id: &PortId) -> PortResult<()> {
        self.load_port(port_id).await?.pause().await
    }

    /// Resume a multi-use port.
    pub async fn resume_port(&self, port_id: &PortId) -> PortResult<()> {
        self.load_port(port_id).await?.resume().await
    }

    /// Delete a port with its session and permissions. Missing ports are
    /// not an error.
    pub async fn clean_port(&self, port_id: &PortId) -> PortResult<()> {
        match self.load_port(port_id).await {
            Ok(mut generator) => {
                generator.clean().await;
                Ok(())
            }
            Err(PortError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn parse_raw(&self, raw: &str) -> PortResult<Value> {
        let raw = raw.trim();
        if raw.starts_with('{') {
            return serde_json::from_str(raw)
                .map_err(|e| PortError::Validation(format!("bundle is not valid JSON: {}", e)));
        }
        let config = &self.ctx.config;
        match parse_link(raw, &config.short_link_prefix, &config.fallback_link_prefix)? {
            ParsedLink::Inline(value) => Ok(value),
            ParsedLink::BundleId(bundle_id) => Err(PortError::Validation(format!(
                "short link {} must be resolved before reading",
                bundle_id
            ))),
        }
    }

    async fn set_contact_sharing_for_chat(&self, chat_id: &ChatId, allowed: bool) -> PortResult<()> {
        let chat = self
            .ctx
            .connections
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("chat {}", chat_id)))?;
        let pair_hash = chat
            .pair_hash
            .ok_or_else(|| PortError::Validation(format!("chat {} is not a direct chat", chat_id)))?;

        let key = CorrelationKey::SharedContactPort(pair_hash.clone());
        if let Some(record) = self.ctx.store.find_generated(&key).await? {
            let mut generator = self.registry.load_generator(&self.ctx, record)?;
            return if allowed {
                generator.resume().await
            } else {
                generator.pause().await
            };
        }
        if !set_contact_sharing(&self.ctx, &pair_hash, allowed).await? {
            return Err(PortError::NotFound(format!("line permissions of {}", pair_hash)));
        }
        debug!(chat_id = %chat_id, allowed, "[portline] contact sharing updated");
        Ok(())
    }

    async fn clean_read_record(&self, record: ReadPortRecord) {
        match self.registry.load_reader(&self.ctx, record.clone()) {
            Ok(reader) => reader.clean().await,
            Err(_) => clean_read(&self.ctx, &record).await,
        }
    }
}

#[async_trait]
impl PortProtocolApi for PortService {
    async fn try_create_port(
        &self,
        request: CreatePortRequest,
    ) -> PortResult<Box<dyn PortGenerator>> {
        self.registry.try_create_generator(&self.ctx, request).await
    }

    async fn try_read_bundle(
        &self,
        raw: &str,
        channel: Option<String>,
        folder_id: Option<FolderId>,
    ) -> PortResult<ReadPortRecord> {
        let value = self.parse_raw(raw)?;
        let bundle = self.registry.validate_any(&value)?;
        self.registry
            .try_accept(&self.ctx, &bundle, Permissions::default(), folder_id, channel)
            .await
    }

    async fn on_line_created(
        &self,
        kind: PortKind,
        port_id: &PortId,
        request: &ConnectionRequest,
    ) -> PortResult<()> {
        let mut generator = self.load_port(port_id).await?;
        if generator.kind() != kind {
            return Err(PortError::Validation(format!(
                "port {} is a {} port, not {}",
                port_id,
                generator.kind(),
                kind
            )));
        }
        generator.use_connection(request).await
    }

    async fn accept_contact_port_ticket(
        &self,
        port_id: &PortId,
        ticket_id: TicketId,
        chat_id: &ChatId,
    ) -> PortResult<()> {
        self.load_port(port_id)
            .await?
            .accept_ticket(ticket_id, chat_id)
            .await
    }

    async fn process_read_bundles(&self) -> PortResult<SweepReport> {
        self.sweeper.sweep().await
    }

    async fn clean_delete_read_port(&self, port_id: &PortId) -> PortResult<()> {
        if let Some(record) = self.ctx.store.get_read(port_id).await? {
            self.clean_read_record(record).await;
        }
        Ok(())
    }

    async fn cleanup_expired_ports(&self) -> PortResult<usize> {
        let now = Utc::now();
        let mut removed = 0;

        for port in self.ctx.store.list_generated().await? {
            let expired = matches!(port, GeneratedPort::Direct(_) | GeneratedPort::Group(_))
                && port.expiry_timestamp().is_some_and(|expiry| expiry <= now);
            if !expired {
                continue;
            }
            let port_id = port.port_id().to_string();
            match self.registry.load_generator(&self.ctx, port) {
                Ok(mut generator) => generator.clean().await,
                Err(e) => {
                    warn!(port_id = %port_id, error = %e, "[portline] deleting unloadable expired port");
                    self.ctx.store.delete_generated(&port_id).await?;
                }
            }
            removed += 1;
        }

        for record in self.ctx.store.list_read().await? {
            if record.is_expired(now) {
                self.clean_read_record(record).await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "[portline] expired ports cleaned up");
        }
        Ok(removed)
    }

    async fn list_generated_ports(&self) -> PortResult<Vec<PortSummary>> {
        let now = Utc::now();
        let mut ports: Vec<PortSummary> = self
            .ctx
            .store
            .list_generated()
            .await?
            .iter()
            .filter_map(|port| PortSummary::of(port, now))
            .collect();
        ports.sort_by(|a, b| b.created_on.cmp(&a.created_on));
        Ok(ports)
    }

    async fn pause_contact_sharing(&self, chat_id: &ChatId) -> PortResult<()> {
        self.set_contact_sharing_for_chat(chat_id, false).await
    }

    async fn resume_contact_sharing(&self, chat_id: &ChatId) -> PortResult<()> {
        self.set_contact_sharing_for_chat(chat_id, true).await
    }
}
