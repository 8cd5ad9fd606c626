//! # Group Superport (1.0.0)
//!
//! The one multi-use invitation of a group. Creation is idempotent per
//! group unless a regeneration is asked for.

use super::{delete_remote_port, resolve_shareable_link, set_remote_paused};
use crate::application::context::PortContext;
use crate::domain::{
    clip_name, Bundle, CorrelationKey, GeneratedPort, GroupBundle, GroupId, GroupSuperportRecord,
    PortError, PortKind, PortResult, RemotePort, LATEST_VERSION, ORG_NAME,
};
use crate::metrics;
use crate::ports::PortGenerator;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

/// Group superport generator, version 1.0.0.
pub struct GroupSuperportV1 {
    ctx: PortContext,
    record: GroupSuperportRecord,
}

impl GroupSuperportV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Return the group's superport, creating it if there is none.
    ///
    /// With `regenerate` an existing superport is cleaned first.
    pub async fn create(
        ctx: &PortContext,
        group_id: GroupId,
        name: String,
        description: Option<String>,
        limit: Option<u32>,
        regenerate: bool,
    ) -> PortResult<Self> {
        let key = CorrelationKey::GroupSuperport(group_id.clone());
        match ctx.store.find_generated(&key).await? {
            Some(GeneratedPort::GroupSuperport(existing)) if !regenerate => {
                return Ok(Self::load(ctx, existing));
            }
            Some(GeneratedPort::GroupSuperport(existing)) => {
                info!(group_id = %group_id, "[portline] regenerating group superport");
                Self::load(ctx, existing).clean().await;
            }
            Some(other) => {
                return Err(PortError::Storage(format!(
                    "group superport key resolved to a {} port",
                    other.kind()
                )));
            }
            None => {}
        }

        let port_id = ctx.issuer.new_group_superport(&group_id).await?;
        let record = GroupSuperportRecord {
            port_id,
            version: Self::VERSION.to_string(),
            group_id,
            name,
            description,
            created_on: Utc::now(),
            connections_limit: limit,
            connections_made: 0,
            paused: false,
            bundle_id: None,
        };
        ctx.store
            .save_generated(GeneratedPort::GroupSuperport(record.clone()))
            .await?;

        metrics::record_port_created(PortKind::GroupSuperport);
        info!(port_id = %record.port_id, group_id = %record.group_id, "[portline] group superport created");
        Ok(Self::load(ctx, record))
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: GroupSuperportRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    /// Typed record.
    pub fn data(&self) -> &GroupSuperportRecord {
        &self.record
    }

    fn remote(&self) -> RemotePort {
        RemotePort::GroupSuperport(self.record.group_id.clone())
    }

    async fn persist(&self) -> PortResult<()> {
        self.ctx
            .store
            .save_generated(GeneratedPort::GroupSuperport(self.record.clone()))
            .await
    }

    async fn set_paused(&mut self, paused: bool) -> PortResult<()> {
        set_remote_paused(&self.ctx, &self.remote(), paused).await;
        self.record.paused = paused;
        self.persist().await
    }
}

#[async_trait]
impl PortGenerator for GroupSuperportV1 {
    fn kind(&self) -> PortKind {
        PortKind::GroupSuperport
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn port_id(&self) -> &str {
        &self.record.port_id
    }

    fn record(&self) -> GeneratedPort {
        GeneratedPort::GroupSuperport(self.record.clone())
    }

    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle> {
        Ok(Bundle::Group(GroupBundle {
            port_id: self.record.port_id.clone(),
            version: self.record.version.clone(),
            org: ORG_NAME.to_string(),
            target: PortKind::GroupSuperport,
            name: Some(clip_name(&self.record.name)),
            description: self.record.description.clone(),
            expiry_timestamp: None,
        }))
    }

    async fn get_shareable_link(&mut self) -> PortResult<String> {
        let bundle = self.get_shareable_bundle().await?;
        let resolved =
            resolve_shareable_link(&self.ctx, self.record.bundle_id.as_deref(), &bundle, true)
                .await?;
        if let Some(bundle_id) = resolved.minted {
            self.record.bundle_id = Some(bundle_id);
            if let Err(e) = self.persist().await {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to cache bundle id");
            }
        }
        Ok(resolved.link)
    }

    async fn pause(&mut self) -> PortResult<()> {
        self.set_paused(true).await
    }

    async fn resume(&mut self) -> PortResult<()> {
        self.set_paused(false).await
    }

    async fn clean(&mut self) {
        delete_remote_port(&self.ctx, &self.remote()).await;
        if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete group superport");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::config::PortProtocolConfig;

    #[tokio::test]
    async fn test_create_is_idempotent_per_group() {
        let backend = InMemoryBackend::new("Carol");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let first = GroupSuperportV1::create(&ctx, "G1".into(), "Hikers".into(), None, None, false)
            .await
            .unwrap();
        let second = GroupSuperportV1::create(&ctx, "G1".into(), "Hikers".into(), None, None, false)
            .await
            .unwrap();
        assert_eq!(first.port_id(), second.port_id());
        assert_eq!(backend.store.generated_count(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_replaces_port() {
        let backend = InMemoryBackend::new("Carol");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let first = GroupSuperportV1::create(&ctx, "G1".into(), "Hikers".into(), None, None, false)
            .await
            .unwrap();
        let second = GroupSuperportV1::create(&ctx, "G1".into(), "Hikers".into(), None, Some(10), true)
            .await
            .unwrap();
        assert_ne!(first.port_id(), second.port_id());
        assert_eq!(second.data().connections_limit, Some(10));
        assert_eq!(backend.store.generated_count(), 1);
        assert!(!backend.issuer.is_deleted(&second.remote()));
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let backend = InMemoryBackend::new("Carol");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let mut port = GroupSuperportV1::create(&ctx, "G1".into(), "Hikers".into(), None, None, false)
            .await
            .unwrap();
        port.pause().await.unwrap();
        assert!(port.data().paused);
        assert!(backend.issuer.is_paused(&port.remote()));
        port.resume().await.unwrap();
        assert!(!port.data().paused);
        assert!(!backend.issuer.is_paused(&port.remote()));
    }
}
