//! # Session Vault
//!
//! Reference `CryptoCollaborator`: X25519 key agreement, SHA-256 key
//! derivation and XChaCha20-Poly1305 sealing. Ciphertexts are
//! `base64(nonce || ciphertext)`.

use crate::domain::{ContactPortMaterial, CryptoId, PortError, PortResult};
use crate::ports::CryptoCollaborator;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use parking_lot::RwLock;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

const NONCE_LEN: usize = 24;

/// Symmetric key derived from a key agreement.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
struct SharedKey([u8; 32]);

#[derive(Clone)]
struct Session {
    secret: StaticSecret,
    public: PublicKey,
    rad: String,
    shared_key: Option<SharedKey>,
    peer_key_hash: Option<String>,
    peer_rad: Option<String>,
    material: Option<ContactPortMaterial>,
}

impl Session {
    fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey::from(&secret);
        Self {
            secret,
            public,
            rad: random_hex(16),
            shared_key: None,
            peer_key_hash: None,
            peer_rad: None,
            material: None,
        }
    }

    fn key(&self) -> PortResult<&SharedKey> {
        self.shared_key
            .as_ref()
            .ok_or_else(|| PortError::Crypto("no shared secret derived".to_string()))
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn parse_public_key(hex_key: &str) -> PortResult<PublicKey> {
    let bytes = hex::decode(hex_key).map_err(|e| PortError::Crypto(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| PortError::Crypto("public key must be 32 bytes".to_string()))?;
    Ok(PublicKey::from(bytes))
}

/// Hash of a public key as published in bundles.
pub fn public_key_hash(public: &PublicKey) -> String {
    hex::encode(Sha256::digest(public.as_bytes()))
}

/// In-memory crypto sessions.
pub struct SessionVault {
    sessions: RwLock<HashMap<CryptoId, Session>>,
}

impl SessionVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether a session exists.
    pub fn contains(&self, crypto_id: &str) -> bool {
        self.sessions.read().contains_key(crypto_id)
    }

    fn with_session<T>(
        &self,
        crypto_id: &CryptoId,
        f: impl FnOnce(&Session) -> PortResult<T>,
    ) -> PortResult<T> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(crypto_id)
            .ok_or_else(|| PortError::NotFound(format!("crypto session {}", crypto_id)))?;
        f(session)
    }

    fn with_session_mut<T>(
        &self,
        crypto_id: &CryptoId,
        f: impl FnOnce(&mut Session) -> PortResult<T>,
    ) -> PortResult<T> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(crypto_id)
            .ok_or_else(|| PortError::NotFound(format!("crypto session {}", crypto_id)))?;
        f(session)
    }

    fn insert(&self, session: Session) -> CryptoId {
        let crypto_id = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.write().insert(crypto_id.clone(), session);
        crypto_id
    }
}

impl Default for SessionVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CryptoCollaborator for SessionVault {
    async fn create_session(&self, clone_from: Option<&CryptoId>) -> PortResult<CryptoId> {
        let session = match clone_from {
            Some(source) => self.with_session(source, |s| Ok(s.clone()))?,
            None => Session::generate(),
        };
        let crypto_id = self.insert(session);
        debug!(crypto_id = %crypto_id, cloned = clone_from.is_some(), "[portline] crypto session created");
        Ok(crypto_id)
    }

    async fn create_contact_port_session(
        &self,
        material: &ContactPortMaterial,
    ) -> PortResult<CryptoId> {
        parse_public_key(&material.pubkey)?;
        let mut session = Session::generate();
        session.material = Some(material.clone());
        Ok(self.insert(session))
    }

    async fn get_rad(&self, crypto_id: &CryptoId) -> PortResult<String> {
        self.with_session(crypto_id, |s| Ok(s.rad.clone()))
    }

    async fn get_peer_rad(&self, crypto_id: &CryptoId) -> PortResult<String> {
        self.with_session(crypto_id, |s| {
            s.peer_rad
                .clone()
                .ok_or_else(|| PortError::Crypto("peer rad not imported".to_string()))
        })
    }

    async fn get_public_key(&self, crypto_id: &CryptoId) -> PortResult<String> {
        self.with_session(crypto_id, |s| Ok(hex::encode(s.public.as_bytes())))
    }

    async fn get_public_key_hash(&self, crypto_id: &CryptoId) -> PortResult<String> {
        self.with_session(crypto_id, |s| Ok(public_key_hash(&s.public)))
    }

    async fn get_contact_port_material(
        &self,
        crypto_id: &CryptoId,
    ) -> PortResult<ContactPortMaterial> {
        self.with_session(crypto_id, |s| {
            s.material
                .clone()
                .ok_or_else(|| PortError::Crypto("not a contact port session".to_string()))
        })
    }

    async fn update_shared_secret(
        &self,
        crypto_id: &CryptoId,
        peer_public_key: &str,
    ) -> PortResult<()> {
        let peer = parse_public_key(peer_public_key)?;
        self.with_session_mut(crypto_id, |s| {
            let shared = s.secret.diffie_hellman(&peer);
            let digest = Sha256::digest(shared.as_bytes());
            let mut key = [0u8; 32];
            key.copy_from_slice(&digest);
            s.shared_key = Some(SharedKey(key));
            key.zeroize();
            Ok(())
        })
    }

    async fn update_peer_key_hash_and_rad(
        &self,
        crypto_id: &CryptoId,
        key_hash: &str,
        rad: &str,
    ) -> PortResult<()> {
        self.with_session_mut(crypto_id, |s| {
            s.peer_key_hash = Some(key_hash.to_string());
            s.peer_rad = Some(rad.to_string());
            Ok(())
        })
    }

    async fn encrypt(&self, crypto_id: &CryptoId, plaintext: &str) -> PortResult<String> {
        self.with_session(crypto_id, |s| {
            let cipher = XChaCha20Poly1305::new((&s.key()?.0).into());
            let mut nonce = [0u8; NONCE_LEN];
            rand::thread_rng().fill_bytes(&mut nonce);
            let ciphertext = cipher
                .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
                .map_err(|e| PortError::Crypto(e.to_string()))?;
            let mut sealed = nonce.to_vec();
            sealed.extend_from_slice(&ciphertext);
            Ok(STANDARD.encode(sealed))
        })
    }

    async fn decrypt(&self, crypto_id: &CryptoId, ciphertext: &str) -> PortResult<String> {
        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|e| PortError::Crypto(e.to_string()))?;
        if sealed.len() <= NONCE_LEN {
            return Err(PortError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce, body) = sealed.split_at(NONCE_LEN);
        self.with_session(crypto_id, |s| {
            let cipher = XChaCha20Poly1305::new((&s.key()?.0).into());
            let plaintext = cipher
                .decrypt(XNonce::from_slice(nonce), body)
                .map_err(|e| PortError::Crypto(e.to_string()))?;
            String::from_utf8(plaintext).map_err(|e| PortError::Crypto(e.to_string()))
        })
    }

    async fn delete_session(&self, crypto_id: &CryptoId) -> PortResult<()> {
        self.sessions.write().remove(crypto_id);
        Ok(())
    }
}
