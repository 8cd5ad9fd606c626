//! # Intro Messages
//!
//! The reader proves liveness by echoing the generator's rad inside a secret
//! encrypted under the key agreed from both public keys.

use crate::domain::{CryptoId, IntroMessage, IntroSecret, PortError, PortResult};
use crate::ports::CryptoCollaborator;

/// Build the intro message a reader sends through the issuer.
pub async fn build_intro_message(
    crypto: &dyn CryptoCollaborator,
    crypto_id: &CryptoId,
    secret: &IntroSecret,
) -> PortResult<IntroMessage> {
    let plaintext =
        serde_json::to_string(secret).map_err(|e| PortError::Crypto(e.to_string()))?;
    let encrypted_secret_content = crypto.encrypt(crypto_id, &plaintext).await?;
    Ok(IntroMessage {
        pubkey: crypto.get_public_key(crypto_id).await?,
        encrypted_secret_content,
    })
}

/// Decrypt and check an intro message against the port's session.
///
/// Crypto and format failures become `Verification`; transient issuer errors
/// from a remote-backed collaborator pass through unchanged.
pub async fn verify_intro_message(
    crypto: &dyn CryptoCollaborator,
    crypto_id: &CryptoId,
    intro: &IntroMessage,
) -> PortResult<IntroSecret> {
    if intro.pubkey.is_empty() || intro.encrypted_secret_content.is_empty() {
        return Err(PortError::Verification("incomplete intro message".to_string()));
    }
    crypto
        .update_shared_secret(crypto_id, &intro.pubkey)
        .await
        .map_err(into_verification)?;
    let plaintext = crypto
        .decrypt(crypto_id, &intro.encrypted_secret_content)
        .await
        .map_err(into_verification)?;
    let secret: IntroSecret = serde_json::from_str(&plaintext)
        .map_err(|_| PortError::Verification("malformed intro secret".to_string()))?;
    let rad = crypto.get_rad(crypto_id).await?;
    if secret.rad != rad {
        return Err(PortError::Verification("rad mismatch".to_string()));
    }
    Ok(secret)
}

fn into_verification(err: PortError) -> PortError {
    if err.is_transient() {
        err
    } else {
        PortError::Verification(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SessionVault;

    #[tokio::test]
    async fn test_intro_round_trip() {
        let vault = SessionVault::new();
        let generator = vault.create_session(None).await.unwrap();
        let reader = vault.create_session(None).await.unwrap();
        let generator_pub = vault.get_public_key(&generator).await.unwrap();
        let generator_rad = vault.get_rad(&generator).await.unwrap();
        vault.update_shared_secret(&reader, &generator_pub).await.unwrap();

        let secret = IntroSecret {
            rad: generator_rad,
            name: "Bob".into(),
            ticket: None,
        };
        let intro = build_intro_message(&vault, &reader, &secret).await.unwrap();
        let verified = verify_intro_message(&vault, &generator, &intro).await.unwrap();
        assert_eq!(verified, secret);
    }

    #[tokio::test]
    async fn test_wrong_rad_is_verification_error() {
        let vault = SessionVault::new();
        let generator = vault.create_session(None).await.unwrap();
        let reader = vault.create_session(None).await.unwrap();
        let generator_pub = vault.get_public_key(&generator).await.unwrap();
        vault.update_shared_secret(&reader, &generator_pub).await.unwrap();

        let secret = IntroSecret {
            rad: "0".repeat(32),
            name: "Mallory".into(),
            ticket: None,
        };
        let intro = build_intro_message(&vault, &reader, &secret).await.unwrap();
        let err = verify_intro_message(&vault, &generator, &intro).await.unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
    }

    #[tokio::test]
    async fn test_garbage_ciphertext_is_verification_error() {
        let vault = SessionVault::new();
        let generator = vault.create_session(None).await.unwrap();
        let reader = vault.create_session(None).await.unwrap();
        let intro = IntroMessage {
            pubkey: vault.get_public_key(&reader).await.unwrap(),
            encrypted_secret_content: "bm90IGEgY2lwaGVydGV4dA==".into(),
        };
        let err = verify_intro_message(&vault, &generator, &intro).await.unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
    }
}
