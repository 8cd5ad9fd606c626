//! # In-Memory Connections and Permissions
//!
//! Reference `ConnectionStore` and `PermissionStore`. Line insertion takes
//! the write lock for the check and the insert, so it is atomic.

use crate::domain::{
    Chat, ChatId, ChatKind, Contact, CryptoId, GroupId, Line, LineId, PairHash, Permissions,
    PermissionsId, PortError, PortResult,
};
use crate::ports::{ConnectionStore, PermissionStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// In-memory chats, contacts and lines.
#[derive(Default)]
pub struct InMemoryConnectionStore {
    lines: RwLock<HashMap<LineId, Line>>,
    chats: RwLock<HashMap<ChatId, Chat>>,
    contacts: RwLock<HashMap<PairHash, Contact>>,
    blocked: RwLock<HashSet<PairHash>>,
    chat_save_failure: RwLock<Option<PortError>>,
}

impl InMemoryConnectionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block a peer.
    pub fn block(&self, pair_hash: impl Into<PairHash>) {
        self.blocked.write().insert(pair_hash.into());
    }

    /// All chats.
    pub fn chats(&self) -> Vec<Chat> {
        self.chats.read().values().cloned().collect()
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.read().len()
    }

    /// Mark a line as (dis)connected.
    pub fn set_disconnected(&self, line_id: &str, disconnected: bool) {
        if let Some(line) = self.lines.write().get_mut(line_id) {
            line.disconnected = disconnected;
        }
    }

    /// Make every future chat save fail with `err`.
    pub fn fail_chat_saves(&self, err: PortError) {
        *self.chat_save_failure.write() = Some(err);
    }

    /// Stop failing chat saves.
    pub fn recover_chat_saves(&self) {
        *self.chat_save_failure.write() = None;
    }

    /// Mark a line as authenticated.
    pub fn set_authenticated(&self, line_id: &str, authenticated: bool) {
        if let Some(line) = self.lines.write().get_mut(line_id) {
            line.authenticated = authenticated;
        }
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn get_line(&self, line_id: &LineId) -> PortResult<Option<Line>> {
        Ok(self.lines.read().get(line_id).cloned())
    }

    async fn insert_line_if_absent(&self, line: Line) -> PortResult<bool> {
        let mut lines = self.lines.write();
        if lines.contains_key(&line.line_id) {
            return Ok(false);
        }
        lines.insert(line.line_id.clone(), line);
        Ok(true)
    }

    async fn attach_line_session(
        &self,
        line_id: &LineId,
        crypto_id: CryptoId,
        permissions_id: PermissionsId,
    ) -> PortResult<()> {
        let mut lines = self.lines.write();
        let line = lines
            .get_mut(line_id)
            .ok_or_else(|| PortError::NotFound(format!("line {}", line_id)))?;
        line.crypto_id = Some(crypto_id);
        line.permissions_id = Some(permissions_id);
        Ok(())
    }

    async fn delete_line(&self, line_id: &LineId) -> PortResult<()> {
        self.lines.write().remove(line_id);
        Ok(())
    }

    async fn get_chat(&self, chat_id: &ChatId) -> PortResult<Option<Chat>> {
        Ok(self.chats.read().get(chat_id).cloned())
    }

    async fn chat_for_pair_hash(&self, pair_hash: &PairHash) -> PortResult<Option<Chat>> {
        Ok(self
            .chats
            .read()
            .values()
            .find(|c| c.kind == ChatKind::Direct && c.pair_hash.as_ref() == Some(pair_hash))
            .cloned())
    }

    async fn chat_for_line(&self, line_id: &LineId) -> PortResult<Option<Chat>> {
        Ok(self
            .chats
            .read()
            .values()
            .find(|c| &c.line_id == line_id)
            .cloned())
    }

    async fn chat_for_group(&self, group_id: &GroupId) -> PortResult<Option<Chat>> {
        Ok(self
            .chats
            .read()
            .values()
            .find(|c| c.kind == ChatKind::Group && c.group_id.as_ref() == Some(group_id))
            .cloned())
    }

    async fn save_chat(&self, chat: Chat) -> PortResult<()> {
        if let Some(err) = self.chat_save_failure.read().clone() {
            return Err(err);
        }
        self.chats.write().insert(chat.chat_id.clone(), chat);
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &ChatId) -> PortResult<()> {
        self.chats.write().remove(chat_id);
        Ok(())
    }

    async fn get_contact(&self, pair_hash: &PairHash) -> PortResult<Option<Contact>> {
        Ok(self.contacts.read().get(pair_hash).cloned())
    }

    async fn save_contact(&self, contact: Contact) -> PortResult<()> {
        self.contacts
            .write()
            .insert(contact.pair_hash.clone(), contact);
        Ok(())
    }

    async fn is_blocked(&self, pair_hash: &PairHash) -> PortResult<bool> {
        Ok(self.blocked.read().contains(pair_hash))
    }
}

/// In-memory permission sets.
#[derive(Default)]
pub struct InMemoryPermissionStore {
    sets: RwLock<HashMap<PermissionsId, Permissions>>,
}

impl InMemoryPermissionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sets.
    pub fn len(&self) -> usize {
        self.sets.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sets.read().is_empty()
    }

    /// Whether a set exists.
    pub fn contains(&self, id: &str) -> bool {
        self.sets.read().contains_key(id)
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn create_permissions(&self, permissions: Permissions) -> PortResult<PermissionsId> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.sets.write().insert(id.clone(), permissions);
        Ok(id)
    }

    async fn get_permissions(&self, id: &PermissionsId) -> PortResult<Option<Permissions>> {
        Ok(self.sets.read().get(id).cloned())
    }

    async fn update_permissions(
        &self,
        id: &PermissionsId,
        permissions: Permissions,
    ) -> PortResult<()> {
        let mut sets = self.sets.write();
        match sets.get_mut(id) {
            Some(existing) => {
                *existing = permissions;
                Ok(())
            }
            None => Err(PortError::NotFound(format!("permissions {}", id))),
        }
    }

    async fn delete_permissions(&self, id: &PermissionsId) -> PortResult<()> {
        self.sets.write().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_line_if_absent() {
        let store = InMemoryConnectionStore::new();
        assert!(store.insert_line_if_absent(Line::connected("L1")).await.unwrap());
        assert!(!store.insert_line_if_absent(Line::connected("L1")).await.unwrap());
        assert_eq!(store.line_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_claim_once() {
        let store = std::sync::Arc::new(InMemoryConnectionStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert_line_if_absent(Line::connected("L1")).await.unwrap()
            }));
        }
        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_permissions_crud() {
        let store = InMemoryPermissionStore::new();
        let id = store.create_permissions(Permissions::default()).await.unwrap();
        let mut updated = Permissions::default();
        updated.notifications = false;
        store.update_permissions(&id, updated.clone()).await.unwrap();
        assert_eq!(store.get_permissions(&id).await.unwrap(), Some(updated));
        store.delete_permissions(&id).await.unwrap();
        store.delete_permissions(&id).await.unwrap();
        assert!(store.is_empty());
    }
}
