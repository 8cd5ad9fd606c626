//! # Generators
//!
//! Owner side of every port kind, one type per kind and version.
//!
//! ## Handshake
//!
//! Crypto-bearing generators (direct port, superport, shared contact port)
//! consume a connection attempt through [`run_handshake`]:
//!
//! ```text
//! 1. line exists?            -> done (idempotent per line id)
//! 2. permissions             -> created lazily
//! 3. capacity                -> paused / expired / limit reached
//! 4. verify intro            -> rad echo (+ ticket)
//! 5. blocked peer            -> reject
//! 6. merge                   -> claim line, chat + contact
//! 7. line session            -> moved or cloned from the port
//! 8. usage                   -> counters, auto-pause, single-use delete
//! 9. finish                  -> notifications + initial info
//! ```
//!
//! Any failure retires the line (only if this invocation claimed it) and
//! reports it to the issuer. A reconnected chat keeps its previous line
//! until the handshake succeeds and is pointed back at it on failure.

pub mod accepted_contact_port;
pub mod direct;
pub mod group;
pub mod group_superport;
pub mod shared_contact_port;
pub mod superport;

pub use accepted_contact_port::AcceptedContactPortV1;
pub use direct::DirectPortV1;
pub use group::GroupPortV1;
pub use group_superport::GroupSuperportV1;
pub use shared_contact_port::SharedContactPortV1;
pub use superport::SuperportV1;

use super::connection::{
    abandon_line, finish_connection, merge_connection, retire_previous_line, LineClaim,
    MergeOutcome, MergeRequest,
};
use super::context::PortContext;
use crate::algorithms::{bundle_to_fallback_link, short_link, strip_legacy_prefix, verify_intro_message};
use crate::domain::{
    clip_name, Bundle, ConnectionRequest, CryptoId, FolderId, IntroSecret, PairHash, PeerBundle,
    Permissions, PermissionsId, PoolKey, PortError, PortId, PortKind, PortResult, RemotePort,
    TicketId, ORG_NAME,
};
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

// =============================================================================
// Creation helpers
// =============================================================================

/// Take a single-use port id from the local pool, refilling it first when it
/// runs low. A failed refill only fails creation if the pool is empty.
pub(crate) async fn draw_pooled_port(ctx: &PortContext, pool: &PoolKey) -> PortResult<PortId> {
    let remaining = ctx.store.count_unused_ports(pool).await?;
    if remaining < ctx.config.ideal_unused_ports {
        let fetched = match pool {
            PoolKey::Direct => ctx.issuer.fetch_unused_ports().await,
            PoolKey::Group(group_id) => ctx.issuer.fetch_unused_group_ports(group_id).await,
        };
        match fetched {
            Ok(port_ids) => {
                debug!(pool = ?pool, fetched = port_ids.len(), "[portline] unused port pool refilled");
                ctx.store.push_unused_ports(pool, port_ids).await?;
            }
            Err(e) => warn!(pool = ?pool, remaining, error = %e, "[portline] failed to refill unused port pool"),
        }
    }
    ctx.store
        .pop_unused_port(pool)
        .await?
        .ok_or_else(|| PortError::TransientIssuer("no unused ports available".to_string()))
}

/// Make sure a permission set exists, creating a default one when absent.
///
/// Returns the id and whether it was just created.
pub(crate) async fn ensure_permissions(
    ctx: &PortContext,
    slot: &mut Option<PermissionsId>,
) -> PortResult<(PermissionsId, bool)> {
    match slot {
        Some(id) => Ok((id.clone(), false)),
        None => {
            let id = ctx.permissions.create_permissions(Permissions::default()).await?;
            *slot = Some(id.clone());
            Ok((id, true))
        }
    }
}

/// Store caller-chosen permissions, or the defaults.
pub(crate) async fn create_permissions(
    ctx: &PortContext,
    permissions: Option<Permissions>,
) -> PortResult<PermissionsId> {
    ctx.permissions
        .create_permissions(permissions.unwrap_or_default())
        .await
}

/// Replace a port's permission set, creating it if missing.
pub(crate) async fn replace_permissions(
    ctx: &PortContext,
    slot: &mut Option<PermissionsId>,
    permissions: Permissions,
) -> PortResult<()> {
    match slot {
        Some(id) => ctx.permissions.update_permissions(id, permissions).await,
        None => {
            *slot = Some(ctx.permissions.create_permissions(permissions).await?);
            Ok(())
        }
    }
}

/// Clone a port's session and permission set for a new chat.
pub(crate) async fn clone_port_session(
    ctx: &PortContext,
    crypto_id: &CryptoId,
    permissions_id: &PermissionsId,
) -> PortResult<(CryptoId, PermissionsId)> {
    let permissions = ctx
        .permissions
        .get_permissions(permissions_id)
        .await?
        .unwrap_or_default();
    let line_crypto = ctx.crypto.create_session(Some(crypto_id)).await?;
    match ctx.permissions.create_permissions(permissions).await {
        Ok(line_permissions) => Ok((line_crypto, line_permissions)),
        Err(e) => {
            delete_owned(ctx, Some(&line_crypto), None).await;
            Err(e)
        }
    }
}

/// Delete a crypto session and a permission set. Never raises.
pub(crate) async fn delete_owned(
    ctx: &PortContext,
    crypto_id: Option<&CryptoId>,
    permissions_id: Option<&PermissionsId>,
) {
    if let Some(crypto_id) = crypto_id {
        if let Err(e) = ctx.crypto.delete_session(crypto_id).await {
            warn!(crypto_id = %crypto_id, error = %e, "[portline] failed to delete crypto session");
        }
    }
    if let Some(permissions_id) = permissions_id {
        if let Err(e) = ctx.permissions.delete_permissions(permissions_id).await {
            warn!(permissions_id = %permissions_id, error = %e, "[portline] failed to delete permissions");
        }
    }
}

// =============================================================================
// Remote calls
// =============================================================================

/// Pause or resume a remote port; a port already gone counts as done.
pub(crate) async fn set_remote_paused(ctx: &PortContext, port: &RemotePort, paused: bool) {
    match ctx.issuer.set_paused(port, paused).await {
        Ok(()) => {}
        Err(e) if e.is_permanent() => {
            debug!(port = %port, "[portline] remote port already gone");
        }
        Err(e) => warn!(port = %port, paused, error = %e, "[portline] failed to update remote pause state"),
    }
}

/// Delete a remote port; a port already gone counts as done.
pub(crate) async fn delete_remote_port(ctx: &PortContext, port: &RemotePort) {
    match ctx.issuer.delete_port(port).await {
        Ok(()) => {}
        Err(e) if e.is_permanent() => {
            debug!(port = %port, "[portline] remote port already gone");
        }
        Err(e) => warn!(port = %port, error = %e, "[portline] failed to delete remote port"),
    }
}

// =============================================================================
// Sharing
// =============================================================================

/// Peer bundle published from a port session.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn peer_bundle(
    ctx: &PortContext,
    kind: PortKind,
    port_id: &PortId,
    version: &str,
    crypto_id: &CryptoId,
    name: Option<String>,
    ticket: Option<TicketId>,
    expiry_timestamp: Option<DateTime<Utc>>,
) -> PortResult<PeerBundle> {
    Ok(PeerBundle {
        port_id: port_id.clone(),
        version: version.to_string(),
        org: ORG_NAME.to_string(),
        target: kind,
        name: name.map(|n| clip_name(&n)),
        rad: ctx.crypto.get_rad(crypto_id).await?,
        key_hash: ctx.crypto.get_public_key_hash(crypto_id).await?,
        pubkey: Some(ctx.crypto.get_public_key(crypto_id).await?),
        ticket,
        expiry_timestamp,
    })
}

/// Own display name, or none if the profile cannot be read.
pub(crate) async fn own_name(ctx: &PortContext) -> Option<String> {
    match ctx.profile.own_name().await {
        Ok(name) if !name.is_empty() => Some(name),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "[portline] failed to read own name");
            None
        }
    }
}

/// Link resolved for a bundle.
pub(crate) struct ShareableLink {
    /// Link to share.
    pub link: String,
    /// Bundle id minted by this call, to be cached in the record.
    pub minted: Option<String>,
}

/// Resolve a shareable link: the cached short link, else a freshly minted
/// one, else a self-contained fallback link. Never fails on issuer outage.
pub(crate) async fn resolve_shareable_link(
    ctx: &PortContext,
    cached: Option<&str>,
    bundle: &Bundle,
    multi_use: bool,
) -> PortResult<ShareableLink> {
    let config = &ctx.config;
    if let Some(bundle_id) = cached {
        let bundle_id = strip_legacy_prefix(bundle_id, &config.legacy_bundle_prefix);
        return Ok(ShareableLink {
            link: short_link(&config.short_link_prefix, bundle_id),
            minted: None,
        });
    }
    let value = bundle.to_value()?;
    match ctx.issuer.mint_bundle_id(&value, multi_use).await {
        Ok(bundle_id) => Ok(ShareableLink {
            link: short_link(&config.short_link_prefix, &bundle_id),
            minted: Some(bundle_id),
        }),
        Err(e) => {
            warn!(port_id = %bundle.port_id(), error = %e, "[portline] bundle id unavailable, using fallback link");
            Ok(ShareableLink {
                link: bundle_to_fallback_link(&config.fallback_link_prefix, &value)?,
                minted: None,
            })
        }
    }
}

// =============================================================================
// Handshake
// =============================================================================

/// Per-kind hooks of the shared handshake.
#[async_trait]
pub(crate) trait HandshakeTarget: Send + Sync {
    /// Port id.
    fn target_port_id(&self) -> &PortId;

    /// Kind, for logs and metrics.
    fn target_kind(&self) -> PortKind;

    /// Port session the intro is verified with.
    fn port_crypto_id(&self) -> &CryptoId;

    /// Folder for a new chat.
    fn target_folder_id(&self) -> &FolderId;

    /// Label given to a new contact.
    fn target_label(&self) -> Option<&str> {
        None
    }

    /// Contact a new contact was introduced by.
    fn connection_source(&self) -> Option<PairHash> {
        None
    }

    /// Step 2: the port's permission set, created lazily.
    async fn port_permissions(&mut self, ctx: &PortContext) -> PortResult<PermissionsId>;

    /// Step 3: refuse when the port cannot take another connection.
    async fn check_capacity(&mut self, ctx: &PortContext) -> PortResult<()>;

    /// Step 4: extra checks on the decrypted secret.
    async fn check_secret(&self, _ctx: &PortContext, _secret: &IntroSecret) -> PortResult<()> {
        Ok(())
    }

    /// Step 7: session and permissions for the new line.
    async fn line_session(
        &mut self,
        ctx: &PortContext,
        permissions_id: &PermissionsId,
    ) -> PortResult<(CryptoId, PermissionsId)>;

    /// Step 8: usage bookkeeping.
    async fn record_success(&mut self, ctx: &PortContext, secret: &IntroSecret) -> PortResult<()>;

    /// Cleanup specific to the kind after a failed attempt.
    async fn on_failure(&mut self, _ctx: &PortContext, _err: &PortError) {}
}

/// Consume a connection attempt against a generated port.
pub(crate) async fn run_handshake<T: HandshakeTarget + ?Sized>(
    ctx: &PortContext,
    target: &mut T,
    request: &ConnectionRequest,
) -> PortResult<()> {
    if ctx.connections.get_line(&request.line_id).await?.is_some() {
        debug!(
            port_id = %target.target_port_id(),
            line_id = %request.line_id,
            "[portline] line already formed, skipping"
        );
        return Ok(());
    }

    let mut claim = LineClaim::Unclaimed;
    let result = handshake_steps(ctx, target, request, &mut claim).await;
    if let Err(err) = &result {
        warn!(
            port_id = %target.target_port_id(),
            kind = %target.target_kind(),
            line_id = %request.line_id,
            error = %err,
            "[portline] connection attempt rejected"
        );
        metrics::record_use_rejected(err.reason());
        target.on_failure(ctx, err).await;
        abandon_line(ctx, &request.line_id, &claim).await;
    }
    result
}

async fn handshake_steps<T: HandshakeTarget + ?Sized>(
    ctx: &PortContext,
    target: &mut T,
    request: &ConnectionRequest,
    claim: &mut LineClaim,
) -> PortResult<()> {
    let permissions_id = target.port_permissions(ctx).await?;
    target.check_capacity(ctx).await?;

    let secret =
        verify_intro_message(ctx.crypto.as_ref(), target.port_crypto_id(), &request.intro).await?;
    target.check_secret(ctx, &secret).await?;

    if ctx.connections.is_blocked(&request.pair_hash).await? {
        return Err(PortError::Blocked {
            pair_hash: request.pair_hash.clone(),
        });
    }

    let contact_name = target
        .target_label()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .or_else(|| Some(secret.name.clone()).filter(|name| !name.is_empty()))
        .map(|name| clip_name(&name))
        .unwrap_or_else(|| ctx.config.default_contact_name.clone());
    let folder_id = target.target_folder_id().clone();
    let outcome = merge_connection(
        ctx,
        MergeRequest {
            line_id: &request.line_id,
            pair_hash: &request.pair_hash,
            contact_name,
            folder_id: &folder_id,
            connection_source: target.connection_source(),
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
        MergeOutcome::AlreadyFormed => return Ok(()),
    };

    let (line_crypto, line_permissions) = target.line_session(ctx, &permissions_id).await?;
    ctx.connections
        .attach_line_session(&request.line_id, line_crypto, line_permissions.clone())
        .await?;
    target.record_success(ctx, &secret).await?;
    finish_connection(ctx, &chat_id, &request.line_id, &line_permissions, true).await?;
    retire_previous_line(ctx, claim).await;

    metrics::record_connection_formed(target.target_kind());
    info!(
        port_id = %target.target_port_id(),
        kind = %target.target_kind(),
        line_id = %request.line_id,
        chat_id = %chat_id,
        "[portline] connection formed"
    );
    Ok(())
}
