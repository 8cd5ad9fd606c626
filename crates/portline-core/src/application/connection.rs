//! # Connection Formation
//!
//! The merge step shared by generators and readers, and the best-effort
//! teardown used whenever a connection attempt fails.

use super::context::PortContext;
use crate::domain::{
    Chat, ChatId, ChatKind, Contact, FolderId, Line, LineId, PairHash, PermissionsId,
    PortError, PortResult,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Fresh 32-hex identifier for local entities.
pub(crate) fn new_local_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Input of [`merge_connection`].
pub(crate) struct MergeRequest<'a> {
    pub line_id: &'a LineId,
    pub pair_hash: &'a PairHash,
    pub contact_name: String,
    pub folder_id: &'a FolderId,
    pub connection_source: Option<PairHash>,
}

/// What a connection attempt holds once its line is merged.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) enum LineClaim {
    /// Nothing claimed by this invocation.
    #[default]
    Unclaimed,
    /// A new chat routes through the claimed line.
    NewChat,
    /// An existing chat was moved off `previous_line`, which stays until
    /// the attempt succeeds.
    Reconnected { previous_line: LineId },
}

/// Result of [`merge_connection`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MergeOutcome {
    /// The line was claimed and a chat routes through it.
    Formed { chat_id: ChatId, claim: LineClaim },
    /// Another invocation already claimed this line.
    AlreadyFormed,
}

/// Claim the line and attach it to a chat.
///
/// The line insert is the atomic claim; everything after it runs only for
/// the invocation that won it. An existing chat with a live line is a
/// duplicate; one with a dead line is re-pointed, and the dead line is
/// retired by [`retire_previous_line`] once the attempt succeeds. On error
/// the claimed line is released, so the caller's teardown reports it.
pub(crate) async fn merge_connection(
    ctx: &PortContext,
    request: MergeRequest<'_>,
) -> PortResult<MergeOutcome> {
    if !ctx
        .connections
        .insert_line_if_absent(Line::connected(request.line_id.clone()))
        .await?
    {
        debug!(line_id = %request.line_id, "[portline] line already claimed");
        return Ok(MergeOutcome::AlreadyFormed);
    }

    let line_id = request.line_id;
    let result = attach_chat(ctx, request).await;
    if let Err(e) = &result {
        debug!(line_id = %line_id, error = %e, "[portline] releasing claimed line");
        clean_delete_line(ctx, line_id).await;
    }
    result
}

async fn attach_chat(ctx: &PortContext, request: MergeRequest<'_>) -> PortResult<MergeOutcome> {
    if let Some(mut chat) = ctx.connections.chat_for_pair_hash(request.pair_hash).await? {
        let previous = ctx.connections.get_line(&chat.line_id).await?;
        if previous.as_ref().is_some_and(|line| !line.disconnected) {
            return Err(PortError::DuplicateConnection {
                pair_hash: request.pair_hash.clone(),
            });
        }
        let previous_line = std::mem::replace(&mut chat.line_id, request.line_id.clone());
        let chat_id = chat.chat_id.clone();
        ctx.connections.save_chat(chat).await?;
        info!(
            chat_id = %chat_id,
            line_id = %request.line_id,
            old_line_id = %previous_line,
            "[portline] chat re-pointed to new line"
        );
        return Ok(MergeOutcome::Formed {
            chat_id,
            claim: LineClaim::Reconnected { previous_line },
        });
    }

    let chat = Chat {
        chat_id: new_local_id(),
        kind: ChatKind::Direct,
        pair_hash: Some(request.pair_hash.clone()),
        group_id: None,
        line_id: request.line_id.clone(),
        folder_id: request.folder_id.clone(),
    };
    let chat_id = chat.chat_id.clone();
    ctx.connections.save_chat(chat).await?;
    ctx.connections
        .save_contact(Contact {
            pair_hash: request.pair_hash.clone(),
            name: request.contact_name,
            connected_on: Utc::now(),
            connection_source: request.connection_source,
        })
        .await?;
    info!(chat_id = %chat_id, line_id = %request.line_id, "[portline] new chat formed");
    Ok(MergeOutcome::Formed {
        chat_id,
        claim: LineClaim::NewChat,
    })
}

/// Retire the dead line a reconnected chat used to route through.
pub(crate) async fn retire_previous_line(ctx: &PortContext, claim: &LineClaim) {
    if let LineClaim::Reconnected { previous_line } = claim {
        clean_delete_line(ctx, previous_line).await;
    }
}

/// Apply the chat's notification permission and send the initial info
/// exchange for the given side.
pub(crate) async fn finish_connection(
    ctx: &PortContext,
    chat_id: &ChatId,
    line_id: &LineId,
    permissions_id: &PermissionsId,
    generator_side: bool,
) -> PortResult<()> {
    let permissions = ctx
        .permissions
        .get_permissions(permissions_id)
        .await?
        .unwrap_or_default();
    ctx.notifications
        .apply_notification_permission(chat_id, permissions.notifications)
        .await?;
    if generator_side {
        ctx.info.send_generator_info(chat_id, line_id).await
    } else {
        ctx.info.send_reader_info(chat_id, line_id).await
    }
}

/// Delete a line with its crypto session and permissions, and any chat that
/// still routes through it. Never raises.
pub(crate) async fn clean_delete_line(ctx: &PortContext, line_id: &LineId) {
    match ctx.connections.get_line(line_id).await {
        Ok(Some(line)) => {
            if let Some(crypto_id) = &line.crypto_id {
                if let Err(e) = ctx.crypto.delete_session(crypto_id).await {
                    warn!(line_id = %line_id, error = %e, "[portline] failed to delete line session");
                }
            }
            if let Some(permissions_id) = &line.permissions_id {
                if let Err(e) = ctx.permissions.delete_permissions(permissions_id).await {
                    warn!(line_id = %line_id, error = %e, "[portline] failed to delete line permissions");
                }
            }
        }
        Ok(None) => {}
        Err(e) => warn!(line_id = %line_id, error = %e, "[portline] failed to load line"),
    }
    match ctx.connections.chat_for_line(line_id).await {
        Ok(Some(chat)) => {
            if let Err(e) = ctx.connections.delete_chat(&chat.chat_id).await {
                warn!(chat_id = %chat.chat_id, error = %e, "[portline] failed to delete chat");
            }
        }
        Ok(None) => {}
        Err(e) => warn!(line_id = %line_id, error = %e, "[portline] failed to look up chat"),
    }
    if let Err(e) = ctx.connections.delete_line(line_id).await {
        warn!(line_id = %line_id, error = %e, "[portline] failed to delete line");
    }
}

/// Retire a line this invocation claimed and tell the issuer it failed.
///
/// A reconnected chat is pointed back at its previous line first. A line
/// claimed by a concurrent invocation is left alone.
pub(crate) async fn abandon_line(ctx: &PortContext, line_id: &LineId, claim: &LineClaim) {
    match claim {
        LineClaim::Unclaimed => match ctx.connections.get_line(line_id).await {
            Ok(None) => {}
            Ok(Some(_)) => return,
            Err(e) => {
                warn!(line_id = %line_id, error = %e, "[portline] failed to load line");
                return;
            }
        },
        LineClaim::NewChat => {}
        LineClaim::Reconnected { previous_line } => {
            restore_chat_line(ctx, line_id, previous_line).await;
        }
    }
    clean_delete_line(ctx, line_id).await;
    if let Err(e) = ctx.issuer.report_line_failure(line_id).await {
        warn!(line_id = %line_id, error = %e, "[portline] failed to report line failure");
    }
}

async fn restore_chat_line(ctx: &PortContext, line_id: &LineId, previous_line: &LineId) {
    match ctx.connections.chat_for_line(line_id).await {
        Ok(Some(mut chat)) => {
            chat.line_id = previous_line.clone();
            let chat_id = chat.chat_id.clone();
            match ctx.connections.save_chat(chat).await {
                Ok(()) => debug!(chat_id = %chat_id, line_id = %previous_line, "[portline] chat restored to previous line"),
                Err(e) => warn!(chat_id = %chat_id, error = %e, "[portline] failed to restore chat line"),
            }
        }
        Ok(None) => {}
        Err(e) => warn!(line_id = %line_id, error = %e, "[portline] failed to look up chat"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::config::PortProtocolConfig;
    use crate::domain::CryptoId;
    use crate::ports::{ConnectionStore, CryptoCollaborator};

    fn request<'a>(line_id: &'a LineId, pair_hash: &'a PairHash, folder: &'a FolderId) -> MergeRequest<'a> {
        MergeRequest {
            line_id,
            pair_hash,
            contact_name: "Alice".into(),
            folder_id: folder,
            connection_source: None,
        }
    }

    #[tokio::test]
    async fn test_new_chat_and_contact() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let (line, pair, folder) = ("L1".to_string(), "P1".to_string(), "all".to_string());

        let outcome = merge_connection(&ctx, request(&line, &pair, &folder)).await.unwrap();
        assert!(matches!(outcome, MergeOutcome::Formed { claim: LineClaim::NewChat, .. }));
        assert_eq!(backend.connections.chats().len(), 1);
        assert!(backend.connections.get_contact(&pair).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_same_line_is_already_formed() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let (line, pair, folder) = ("L1".to_string(), "P1".to_string(), "all".to_string());

        merge_connection(&ctx, request(&line, &pair, &folder)).await.unwrap();
        let outcome = merge_connection(&ctx, request(&line, &pair, &folder)).await.unwrap();
        assert_eq!(outcome, MergeOutcome::AlreadyFormed);
        assert_eq!(backend.connections.chats().len(), 1);
    }

    #[tokio::test]
    async fn test_live_line_is_duplicate() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let (pair, folder) = ("P1".to_string(), "all".to_string());

        merge_connection(&ctx, request(&"L1".to_string(), &pair, &folder)).await.unwrap();
        let err = merge_connection(&ctx, request(&"L2".to_string(), &pair, &folder))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::DuplicateConnection { .. }));
        assert!(backend.connections.get_line(&"L2".to_string()).await.unwrap().is_none());
        assert!(backend.connections.get_line(&"L1".to_string()).await.unwrap().is_some());
    }

    async fn disconnected_chat(backend: &InMemoryBackend, ctx: &PortContext) -> CryptoId {
        let (old, pair, folder) = ("L0".to_string(), "P1".to_string(), "all".to_string());
        merge_connection(ctx, request(&old, &pair, &folder)).await.unwrap();
        let session = backend.crypto.create_session(None).await.unwrap();
        ctx.connections
            .attach_line_session(&old, session.clone(), "perm".into())
            .await
            .unwrap();
        backend.connections.set_disconnected("L0", true);
        session
    }

    #[tokio::test]
    async fn test_dead_line_is_replaced() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let session = disconnected_chat(&backend, &ctx).await;
        let (new_line, pair, folder) = ("L1".to_string(), "P1".to_string(), "all".to_string());

        let outcome = merge_connection(&ctx, request(&new_line, &pair, &folder))
            .await
            .unwrap();
        let claim = match outcome {
            MergeOutcome::Formed { claim, .. } => claim,
            MergeOutcome::AlreadyFormed => panic!("line should be claimed"),
        };
        assert_eq!(
            claim,
            LineClaim::Reconnected {
                previous_line: "L0".to_string()
            }
        );
        let chat = backend.connections.chat_for_pair_hash(&pair).await.unwrap().unwrap();
        assert_eq!(chat.line_id, "L1");

        // The dead line is kept until the attempt succeeds.
        assert!(backend.connections.get_line(&"L0".to_string()).await.unwrap().is_some());
        retire_previous_line(&ctx, &claim).await;
        assert!(backend.connections.get_line(&"L0".to_string()).await.unwrap().is_none());
        assert!(!backend.crypto.contains(&session));
        assert_eq!(backend.connections.chats().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_existing_chat() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let session = disconnected_chat(&backend, &ctx).await;
        let (new_line, pair, folder) = ("L1".to_string(), "P1".to_string(), "all".to_string());

        let outcome = merge_connection(&ctx, request(&new_line, &pair, &folder))
            .await
            .unwrap();
        let MergeOutcome::Formed { chat_id, claim } = outcome else {
            panic!("line should be claimed");
        };
        abandon_line(&ctx, &new_line, &claim).await;

        let chat = backend.connections.get_chat(&chat_id).await.unwrap().unwrap();
        assert_eq!(chat.line_id, "L0");
        assert!(backend.connections.get_line(&"L0".to_string()).await.unwrap().is_some());
        assert!(backend.connections.get_line(&new_line).await.unwrap().is_none());
        assert!(backend.crypto.contains(&session));
        assert_eq!(backend.issuer.reported_failures(), vec!["L1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_chat_save_releases_line() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let (line, pair, folder) = ("L1".to_string(), "P1".to_string(), "all".to_string());
        backend
            .connections
            .fail_chat_saves(PortError::Storage("disk full".into()));

        let err = merge_connection(&ctx, request(&line, &pair, &folder))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Storage(_)));
        assert!(backend.connections.get_line(&line).await.unwrap().is_none());

        // An unclaimed teardown now reports the released line.
        abandon_line(&ctx, &line, &LineClaim::Unclaimed).await;
        assert_eq!(backend.issuer.reported_failures(), vec!["L1".to_string()]);

        backend.connections.recover_chat_saves();
        let outcome = merge_connection(&ctx, request(&line, &pair, &folder)).await.unwrap();
        assert!(matches!(outcome, MergeOutcome::Formed { claim: LineClaim::NewChat, .. }));
        assert_eq!(backend.connections.chats().len(), 1);
    }

    #[tokio::test]
    async fn test_abandon_reports_claimed_line() {
        let backend = InMemoryBackend::new("me");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let (line, pair, folder) = ("L1".to_string(), "P1".to_string(), "all".to_string());

        merge_connection(&ctx, request(&line, &pair, &folder)).await.unwrap();
        abandon_line(&ctx, &line, &LineClaim::Unclaimed).await;
        assert_eq!(backend.issuer.reported_failures(), Vec::<String>::new());

        abandon_line(&ctx, &line, &LineClaim::NewChat).await;
        assert_eq!(backend.issuer.reported_failures(), vec!["L1".to_string()]);
        assert!(backend.connections.chats().is_empty());
    }
}
