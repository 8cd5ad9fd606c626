//! # Readers
//!
//! Consumer side of accepted bundles. Accepting persists a pending record;
//! using it forms the connection through the issuer.
//!
//! - [`PeerReaderV1`]: direct ports, superports and contact ports
//! - [`GroupReaderV1`]: group ports and group superports
//!
//! Issuer failures are split by class: a transient failure keeps the pending
//! record for the next sweep, anything else discards it.

pub mod group;
pub mod peer;

pub use group::GroupReaderV1;
pub use peer::PeerReaderV1;

use super::context::PortContext;
use super::generators::delete_owned;
use crate::domain::{FolderId, Permissions, PermissionsId, PortResult, ReadPortRecord};
use tracing::warn;

const SHARED_CHANNEL_PREFIX: &str = "shared://";
const CHANNEL_ID_LEN: usize = 32;
const CHANNEL_SEPARATOR_LEN: usize = 3;

/// Split a `shared://<chatId><sep><messageId>` channel into chat and message
/// ids.
pub fn parse_shared_channel(channel: &str) -> Option<(&str, &str)> {
    let rest = channel.strip_prefix(SHARED_CHANNEL_PREFIX)?;
    if rest.len() != 2 * CHANNEL_ID_LEN + CHANNEL_SEPARATOR_LEN {
        return None;
    }
    let chat_id = rest.get(..CHANNEL_ID_LEN)?;
    let message_id = rest.get(CHANNEL_ID_LEN + CHANNEL_SEPARATOR_LEN..)?;
    Some((chat_id, message_id))
}

/// Mark the shared message a bundle came from as accepted. Never raises.
pub(crate) async fn mark_channel_accepted(ctx: &PortContext, channel: Option<&str>) {
    let Some((chat_id, message_id)) = channel.and_then(parse_shared_channel) else {
        return;
    };
    if let Err(e) = ctx
        .info
        .mark_shared_bundle_accepted(&chat_id.to_string(), message_id)
        .await
    {
        warn!(chat_id, message_id, error = %e, "[portline] failed to mark shared bundle accepted");
    }
}

/// Folder for a new chat: the caller's, else the configured default.
pub(crate) fn folder_or_default(ctx: &PortContext, folder_id: Option<FolderId>) -> FolderId {
    folder_id.unwrap_or_else(|| ctx.config.default_folder_id.clone())
}

/// Permission set of a pending record, backfilled for records stored
/// without one.
pub(crate) async fn backfill_permissions(
    ctx: &PortContext,
    record: &mut ReadPortRecord,
) -> PortResult<PermissionsId> {
    if let Some(id) = &record.permissions_id {
        return Ok(id.clone());
    }
    let id = ctx
        .permissions
        .create_permissions(Permissions::default())
        .await?;
    record.permissions_id = Some(id.clone());
    ctx.store.save_read(record.clone()).await?;
    Ok(id)
}

/// Delete a pending record with its crypto session and permissions.
/// Idempotent; never raises.
pub(crate) async fn clean_read(ctx: &PortContext, record: &ReadPortRecord) {
    if let Err(e) = ctx.store.delete_read(&record.port_id).await {
        warn!(port_id = %record.port_id, error = %e, "[portline] failed to delete read record");
    }
    delete_owned(
        ctx,
        record.crypto_id.as_ref(),
        record.permissions_id.as_ref(),
    )
    .await;
}
