//! Sealing of session cookies.
//!
//! A sealed session is `base64url(nonce || ciphertext)` where the ciphertext
//! is the JSON-encoded [`SessionData`] under XChaCha20-Poly1305. The key is
//! derived from the configured cookie password with HKDF-SHA256, so rotating
//! the password invalidates every outstanding cookie.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use super::SessionData;

const NONCE_LEN: usize = 24;
const KDF_SALT: &[u8] = b"memory-lane-session";
const KDF_INFO: &[u8] = b"memory-lane-session-seal-v1";

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("Key derivation failed")]
    KeyDerivation,
    #[error("Session encoding is invalid")]
    Encoding,
    #[error("Session could not be decrypted")]
    Decryption,
    #[error("Session payload is invalid: {0}")]
    Payload(String),
}

/// Seals and unseals session payloads with a key derived from a password.
#[derive(Clone)]
pub struct SessionSealer {
    key: Key,
}

impl SessionSealer {
    pub fn new(cookie_password: &str) -> Result<Self, SealError> {
        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), cookie_password.as_bytes());
        let mut okm = [0u8; 32];
        hk.expand(KDF_INFO, &mut okm)
            .map_err(|_| SealError::KeyDerivation)?;
        Ok(Self {
            key: *Key::from_slice(&okm),
        })
    }

    pub fn seal(&self, data: &SessionData) -> Result<String, SealError> {
        let plaintext = serde_json::to_vec(data).map_err(|e| SealError::Payload(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let cipher = XChaCha20Poly1305::new(&self.key);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce_bytes), plaintext.as_slice())
            .map_err(|_| SealError::Payload("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn unseal(&self, sealed: &str) -> Result<SessionData, SealError> {
        let raw = URL_SAFE_NO_PAD
            .decode(sealed.trim())
            .map_err(|_| SealError::Encoding)?;
        if raw.len() <= NONCE_LEN {
            return Err(SealError::Encoding);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = XChaCha20Poly1305::new(&self.key);
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SealError::Decryption)?;

        serde_json::from_slice(&plaintext).map_err(|e| SealError::Payload(e.to_string()))
    }
}

impl std::fmt::Debug for SessionSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSealer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ProviderUser;

    const PASSWORD: &str = "an-adequately-long-cookie-password-0123";

    fn session() -> SessionData {
        SessionData {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            user: ProviderUser {
                id: "user_01".to_string(),
                email: "ada@example.com".to_string(),
                first_name: Some("Ada".to_string()),
                last_name: None,
                profile_picture_url: None,
            },
        }
    }

    #[test]
    fn test_seal_unseal() {
        let sealer = SessionSealer::new(PASSWORD).unwrap();
        let sealed = sealer.seal(&session()).unwrap();
        assert!(!sealed.contains("access"));

        let unsealed = sealer.unseal(&sealed).unwrap();
        assert_eq!(unsealed, session());
    }

    #[test]
    fn test_seal_is_randomized() {
        let sealer = SessionSealer::new(PASSWORD).unwrap();
        assert_ne!(sealer.seal(&session()).unwrap(), sealer.seal(&session()).unwrap());
    }

    #[test]
    fn test_wrong_password_fails() {
        let sealed = SessionSealer::new(PASSWORD).unwrap().seal(&session()).unwrap();
        let other = SessionSealer::new("a-different-but-equally-long-password!!").unwrap();
        assert!(matches!(other.unseal(&sealed), Err(SealError::Decryption)));
    }

    #[test]
    fn test_tampered_cookie_fails() {
        let sealer = SessionSealer::new(PASSWORD).unwrap();
        let sealed = sealer.seal(&session()).unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert!(matches!(sealer.unseal(&tampered), Err(SealError::Decryption)));
    }

    #[test]
    fn test_garbage_cookie_fails() {
        let sealer = SessionSealer::new(PASSWORD).unwrap();
        assert!(matches!(sealer.unseal("not base64 !!"), Err(SealError::Encoding)));
        assert!(matches!(sealer.unseal("c2hvcnQ"), Err(SealError::Encoding)));
    }
}
