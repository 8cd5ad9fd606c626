//! # Group Reader (1.0.0)
//!
//! Reads group port and group superport bundles. Groups carry no key
//! material: joining is a single issuer call, after which the group chat is
//! created with the member id as its line.

use super::{backfill_permissions, clean_read, folder_or_default, mark_channel_accepted};
use crate::application::connection::new_local_id;
use crate::application::context::PortContext;
use crate::domain::{
    clip_name, Chat, ChatKind, FolderId, GroupBundle, GroupGrant, PermissionsId, Permissions,
    PortError, PortKind, PortResult, ReadPortRecord, LATEST_VERSION,
};
use crate::metrics;
use crate::ports::PortReader;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Reader of group bundles, version 1.0.0.
pub struct GroupReaderV1 {
    ctx: PortContext,
    record: ReadPortRecord,
}

impl GroupReaderV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Persist a pending record for an already validated group bundle.
    pub async fn accept(
        ctx: &PortContext,
        bundle: &GroupBundle,
        permissions: Permissions,
        folder_id: Option<FolderId>,
        channel: Option<String>,
    ) -> PortResult<ReadPortRecord> {
        if !bundle.target.is_group() {
            return Err(PortError::Validation(format!(
                "{} bundles are not read by the group reader",
                bundle.target
            )));
        }
        if let Some(existing) = ctx.store.get_read(&bundle.port_id).await? {
            debug!(port_id = %bundle.port_id, "[portline] group bundle already accepted");
            return Ok(existing);
        }

        let permissions_id = ctx.permissions.create_permissions(permissions).await?;
        let name = bundle
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(clip_name)
            .unwrap_or_else(|| ctx.config.default_group_name.clone());
        let record = ReadPortRecord {
            port_id: bundle.port_id.clone(),
            version: bundle.version.clone(),
            target: bundle.target,
            name: Some(name),
            description: bundle.description.clone(),
            crypto_id: None,
            permissions_id: Some(permissions_id.clone()),
            folder_id: folder_or_default(ctx, folder_id),
            ticket: None,
            created_on: Utc::now(),
            expiry_timestamp: bundle.expiry_timestamp,
            channel,
        };
        if let Err(e) = ctx.store.save_read(record.clone()).await {
            if let Err(cleanup) = ctx.permissions.delete_permissions(&permissions_id).await {
                warn!(error = %cleanup, "[portline] failed to roll back group permissions");
            }
            return Err(e);
        }

        info!(port_id = %record.port_id, kind = %record.target, "[portline] group bundle accepted");
        Ok(record)
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: ReadPortRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    async fn create_group_chat(
        &self,
        grant: &GroupGrant,
        permissions_id: &PermissionsId,
    ) -> PortResult<()> {
        let chat = Chat {
            chat_id: new_local_id(),
            kind: ChatKind::Group,
            pair_hash: None,
            group_id: Some(grant.group_id.clone()),
            line_id: grant.member_id.clone(),
            folder_id: self.record.folder_id.clone(),
        };
        let chat_id = chat.chat_id.clone();
        self.ctx.connections.save_chat(chat).await?;

        let permissions = self
            .ctx
            .permissions
            .get_permissions(permissions_id)
            .await?
            .unwrap_or_default();
        self.ctx
            .notifications
            .apply_notification_permission(&chat_id, permissions.notifications)
            .await?;
        self.ctx
            .info
            .send_reader_info(&chat_id, &grant.member_id)
            .await?;

        metrics::record_connection_formed(self.record.target);
        info!(
            port_id = %self.record.port_id,
            group_id = %grant.group_id,
            chat_id = %chat_id,
            "[portline] joined group"
        );
        Ok(())
    }
}

#[async_trait]
impl PortReader for GroupReaderV1 {
    fn kind(&self) -> PortKind {
        self.record.target
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn record(&self) -> &ReadPortRecord {
        &self.record
    }

    async fn use_bundle(&mut self) -> PortResult<()> {
        if self.record.is_expired(Utc::now()) {
            info!(port_id = %self.record.port_id, "[portline] pending group bundle expired, discarding");
            self.clean().await;
            return Ok(());
        }
        let permissions_id = backfill_permissions(&self.ctx, &mut self.record).await?;

        let grant = match self
            .ctx
            .issuer
            .join_group(self.record.target, &self.record.port_id)
            .await
        {
            Ok(grant) => grant,
            Err(e) if e.is_transient() => {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] issuer unreachable, keeping pending group bundle");
                return Err(e);
            }
            Err(e) => {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] issuer refused group bundle, discarding");
                self.clean().await;
                return Err(e);
            }
        };

        if self
            .ctx
            .connections
            .chat_for_group(&grant.group_id)
            .await?
            .is_some()
        {
            debug!(group_id = %grant.group_id, "[portline] already a member of group");
            self.clean().await;
            return Ok(());
        }

        let result = self.create_group_chat(&grant, &permissions_id).await;
        if result.is_ok() {
            mark_channel_accepted(&self.ctx, self.record.channel.as_deref()).await;
        }
        // Group chats carry no permission set of their own.
        self.clean().await;
        result
    }

    async fn clean(&self) {
        clean_read(&self.ctx, &self.record).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryBackend, InfoSide, IssuerCall};
    use crate::config::PortProtocolConfig;
    use crate::domain::ORG_NAME;
    use crate::ports::{ConnectionStore, PortLifecycleStore};

    fn bundle(target: PortKind) -> GroupBundle {
        GroupBundle {
            port_id: "a".repeat(32),
            version: "1.0.0".into(),
            org: ORG_NAME.into(),
            target,
            name: Some("Hikers".into()),
            description: None,
            expiry_timestamp: None,
        }
    }

    async fn accepted(backend: &InMemoryBackend, notifications: bool) -> GroupReaderV1 {
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let permissions = Permissions {
            notifications,
            ..Permissions::default()
        };
        let record = GroupReaderV1::accept(&ctx, &bundle(PortKind::Group), permissions, None, None)
            .await
            .unwrap();
        GroupReaderV1::load(&ctx, record)
    }

    #[tokio::test]
    async fn test_join_creates_group_chat() {
        let backend = InMemoryBackend::new("Bob");
        let mut reader = accepted(&backend, false).await;

        reader.use_bundle().await.unwrap();

        let group_id = format!("group-{}", "a".repeat(32));
        let chat = backend.connections.chat_for_group(&group_id).await.unwrap().unwrap();
        assert_eq!(chat.kind, ChatKind::Group);
        assert_eq!(backend.notifications.applied(), vec![(chat.chat_id.clone(), false)]);
        assert_eq!(backend.info.sent(), vec![(InfoSide::Reader, chat.chat_id, chat.line_id)]);
        assert_eq!(backend.store.read_count(), 0);
        assert!(backend.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_existing_membership_just_cleans() {
        let backend = InMemoryBackend::new("Bob");
        accepted(&backend, true).await.use_bundle().await.unwrap();
        let mut again = accepted(&backend, true).await;
        again.use_bundle().await.unwrap();

        assert_eq!(backend.connections.chats().len(), 1);
        assert_eq!(backend.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_join_failure_keeps_record() {
        let backend = InMemoryBackend::new("Bob");
        backend
            .issuer
            .fail(IssuerCall::JoinGroup, PortError::TransientIssuer("offline".into()));
        let mut reader = accepted(&backend, true).await;

        assert!(reader.use_bundle().await.unwrap_err().is_transient());
        assert!(backend.store.get_read(&"a".repeat(32)).await.unwrap().is_some());

        backend.issuer.recover(IssuerCall::JoinGroup);
        reader.use_bundle().await.unwrap();
        assert_eq!(backend.store.read_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_join_discards_record() {
        let backend = InMemoryBackend::new("Bob");
        backend
            .issuer
            .fail(IssuerCall::JoinGroup, PortError::PermanentIssuer("404".into()));
        let mut reader = accepted(&backend, true).await;

        assert!(reader.use_bundle().await.unwrap_err().is_permanent());
        assert_eq!(backend.store.read_count(), 0);
        assert!(backend.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_unnamed_group_gets_default_name() {
        let backend = InMemoryBackend::new("Bob");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let mut unnamed = bundle(PortKind::GroupSuperport);
        unnamed.name = None;
        let record = GroupReaderV1::accept(&ctx, &unnamed, Permissions::default(), None, None)
            .await
            .unwrap();
        assert_eq!(record.name, Some(ctx.config.default_group_name.clone()));
        assert_eq!(record.folder_id, ctx.config.default_folder_id);
    }

    #[tokio::test]
    async fn test_peer_bundle_kinds_are_refused() {
        let backend = InMemoryBackend::new("Bob");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let result =
            GroupReaderV1::accept(&ctx, &bundle(PortKind::Direct), Permissions::default(), None, None)
                .await;
        assert!(matches!(result, Err(PortError::Validation(_))));
        assert!(backend.permissions.is_empty());
    }
}
