//! # Peer Reader (1.0.0)
//!
//! Reads direct port, superport and contact port bundles. Accepting imports
//! the generator's rad and key hash into a fresh session and derives the
//! shared secret right away; using the record sends the intro through the
//! issuer and merges the granted line into a chat. A bundle must publish a
//! public key matching its key hash.

use super::{backfill_permissions, clean_read, folder_or_default, mark_channel_accepted};
use crate::algorithms::{build_intro_message, verify_published_key};
use crate::application::connection::{
    abandon_line, finish_connection, merge_connection, retire_previous_line, LineClaim,
    MergeOutcome, MergeRequest,
};
use crate::application::context::PortContext;
use crate::application::generators::{delete_owned, own_name};
use crate::domain::{
    clip_name, CryptoId, FolderId, IntroMessage, IntroSecret, LineGrant, PeerBundle, Permissions,
    PermissionsId, PortError, PortKind, PortResult, ReadPortRecord, LATEST_VERSION,
};
use crate::metrics;
use crate::ports::PortReader;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Reader of crypto-bearing bundles, version 1.0.0.
pub struct PeerReaderV1 {
    ctx: PortContext,
    record: ReadPortRecord,
}

impl PeerReaderV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Persist a pending record for an already validated bundle.
    ///
    /// Accepting the same port twice returns the existing record. Nothing
    /// is left behind on failure.
    pub async fn accept(
        ctx: &PortContext,
        bundle: &PeerBundle,
        permissions: Permissions,
        folder_id: Option<FolderId>,
        channel: Option<String>,
    ) -> PortResult<ReadPortRecord> {
        if bundle.target.is_group() {
            return Err(PortError::Validation(format!(
                "{} bundles are not read by the peer reader",
                bundle.target
            )));
        }
        if bundle.target == PortKind::ContactPort && bundle.ticket.is_none() {
            return Err(PortError::Validation("contact port bundle has no ticket".to_string()));
        }
        let pubkey = bundle
            .pubkey
            .as_deref()
            .ok_or_else(|| PortError::Validation("bundle publishes no pubkey".to_string()))?;
        verify_published_key(pubkey, &bundle.key_hash)?;
        if let Some(existing) = ctx.store.get_read(&bundle.port_id).await? {
            debug!(port_id = %bundle.port_id, "[portline] bundle already accepted");
            return Ok(existing);
        }

        let crypto_id = ctx.crypto.create_session(None).await?;
        let mut permissions_id = None;
        let result = async {
            ctx.crypto
                .update_peer_key_hash_and_rad(&crypto_id, &bundle.key_hash, &bundle.rad)
                .await?;
            ctx.crypto.update_shared_secret(&crypto_id, pubkey).await?;
            let id = ctx.permissions.create_permissions(permissions).await?;
            permissions_id = Some(id.clone());
            let record = ReadPortRecord {
                port_id: bundle.port_id.clone(),
                version: bundle.version.clone(),
                target: bundle.target,
                name: bundle.name.clone(),
                description: None,
                crypto_id: Some(crypto_id.clone()),
                permissions_id: Some(id),
                folder_id: folder_or_default(ctx, folder_id),
                ticket: bundle.ticket.clone(),
                created_on: Utc::now(),
                expiry_timestamp: bundle.expiry_timestamp,
                channel,
            };
            ctx.store.save_read(record.clone()).await?;
            Ok::<_, PortError>(record)
        }
        .await;

        match result {
            Ok(record) => {
                info!(port_id = %record.port_id, kind = %record.target, "[portline] bundle accepted");
                Ok(record)
            }
            Err(e) => {
                delete_owned(ctx, Some(&crypto_id), permissions_id.as_ref()).await;
                Err(e)
            }
        }
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: ReadPortRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    async fn request_line(&self, intro: &IntroMessage) -> PortResult<LineGrant> {
        let record = &self.record;
        match record.target {
            PortKind::ContactPort => {
                let ticket = record.ticket.as_ref().ok_or_else(|| {
                    PortError::Validation("contact port record has no ticket".to_string())
                })?;
                self.ctx
                    .issuer
                    .create_line_from_contact_port(&record.port_id, ticket, intro)
                    .await
            }
            kind => self.ctx.issuer.create_line(kind, &record.port_id, intro).await,
        }
    }

    async fn intro(&self, crypto_id: &CryptoId) -> PortResult<IntroMessage> {
        let secret = IntroSecret {
            rad: self.ctx.crypto.get_peer_rad(crypto_id).await?,
            name: own_name(&self.ctx).await.unwrap_or_default(),
            ticket: self.record.ticket.clone(),
        };
        build_intro_message(self.ctx.crypto.as_ref(), crypto_id, &secret).await
    }

    /// Merge the granted line and hand the session over to it.
    async fn complete(
        &self,
        grant: &LineGrant,
        crypto_id: &CryptoId,
        permissions_id: &PermissionsId,
        claim: &mut LineClaim,
    ) -> PortResult<()> {
        let contact_name = self
            .record
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(clip_name)
            .unwrap_or_else(|| self.ctx.config.default_contact_name.clone());
        let outcome = merge_connection(
            &self.ctx,
            MergeRequest {
                line_id: &grant.line_id,
                pair_hash: &grant.pair_hash,
                contact_name,
                folder_id: &self.record.folder_id,
                connection_source: None,
            },
        )
        .await?;
        let chat_id = match outcome {
            MergeOutcome::Formed {
                chat_id,
                claim: formed,
            } => {
                *claim = formed;
                chat_id
            }
            MergeOutcome::AlreadyFormed => {
                debug!(line_id = %grant.line_id, "[portline] granted line already formed");
                clean_read(&self.ctx, &self.record).await;
                return Ok(());
            }
        };

        self.ctx
            .connections
            .attach_line_session(&grant.line_id, crypto_id.clone(), permissions_id.clone())
            .await?;
        self.ctx.store.delete_read(&self.record.port_id).await?;
        finish_connection(&self.ctx, &chat_id, &grant.line_id, permissions_id, false).await?;
        mark_channel_accepted(&self.ctx, self.record.channel.as_deref()).await;
        retire_previous_line(&self.ctx, claim).await;

        metrics::record_connection_formed(self.record.target);
        info!(
            port_id = %self.record.port_id,
            kind = %self.record.target,
            line_id = %grant.line_id,
            chat_id = %chat_id,
            "[portline] bundle used, connection formed"
        );
        Ok(())
    }
}

#[async_trait]
impl PortReader for PeerReaderV1 {
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
        let crypto_id = self.record.crypto_id.clone().ok_or_else(|| {
            PortError::Validation(format!("read record {} has no crypto session", self.record.port_id))
        })?;
        let permissions_id = backfill_permissions(&self.ctx, &mut self.record).await?;

        if self.record.is_expired(Utc::now()) {
            info!(port_id = %self.record.port_id, "[portline] pending bundle expired, discarding");
            self.clean().await;
            return Ok(());
        }

        let intro = match self.intro(&crypto_id).await {
            Ok(intro) => intro,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] pending bundle unusable, discarding");
                self.clean().await;
                return Err(e);
            }
        };

        let grant = match self.request_line(&intro).await {
            Ok(grant) => grant,
            Err(e) if e.is_transient() => {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] issuer unreachable, keeping pending bundle");
                return Err(e);
            }
            Err(e) => {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] issuer refused bundle, discarding");
                self.clean().await;
                return Err(e);
            }
        };

        let mut claim = LineClaim::Unclaimed;
        let result = self
            .complete(&grant, &crypto_id, &permissions_id, &mut claim)
            .await;
        if let Err(e) = &result {
            warn!(
                port_id = %self.record.port_id,
                line_id = %grant.line_id,
                error = %e,
                "[portline] failed to set up granted line"
            );
            abandon_line(&self.ctx, &grant.line_id, &claim).await;
            self.clean().await;
        }
        result
    }

    async fn clean(&self) {
        clean_read(&self.ctx, &self.record).await;
    }
}
