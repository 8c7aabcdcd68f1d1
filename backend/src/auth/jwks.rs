use std::collections::HashMap;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Why an access token was not accepted.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetchError(String),
}

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[allow(dead_code)]
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

/// Access token claims issued by the identity provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessClaims {
    pub sub: String,
    /// Provider-side session id, used to end the session on logout.
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    pub exp: u64,
    #[serde(default)]
    pub iat: u64,
}

struct VerifyingKey {
    key: DecodingKey,
    algorithm: Algorithm,
}

/// Client for fetching and caching the provider's signing keys.
pub struct JwksClient {
    http_client: Client,
    jwks_uri: String,
    keys: RwLock<HashMap<String, VerifyingKey>>,
    issuer: Option<String>,
}

impl JwksClient {
    /// Keys are fetched at startup by the caller and again on an unknown `kid`.
    pub fn new(http_client: Client, jwks_uri: &str, issuer: Option<&str>) -> Self {
        Self {
            http_client,
            jwks_uri: jwks_uri.to_string(),
            keys: RwLock::new(HashMap::new()),
            issuer: issuer.map(String::from),
        }
    }

    /// Register a key by hand, bypassing the JWKS endpoint.
    pub async fn insert_key(&self, kid: &str, key: DecodingKey, algorithm: Algorithm) {
        self.keys
            .write()
            .await
            .insert(kid.to_string(), VerifyingKey { key, algorithm });
    }

    pub async fn refresh_keys(&self) -> Result<usize, JwtError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| JwtError::JwksFetchError(e.to_string()))?
            .error_for_status()
            .map_err(|e| JwtError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| JwtError::JwksFetchError(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty == "RSA" {
                if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                    match DecodingKey::from_rsa_components(n, e) {
                        Ok(key) => {
                            keys.insert(
                                jwk.kid.clone(),
                                VerifyingKey {
                                    key,
                                    algorithm: Algorithm::RS256,
                                },
                            );
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                        }
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(keys.len())
    }

    /// Verify an access token's signature, expiry and issuer.
    pub async fn verify(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let header = decode_header(token).map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| JwtError::InvalidToken("Missing kid in token header".to_string()))?;

        if !self.keys.read().await.contains_key(&kid) {
            self.refresh_keys().await?;
        }

        let keys = self.keys.read().await;
        let verifying = keys
            .get(&kid)
            .ok_or_else(|| JwtError::KeyNotFound(kid.clone()))?;

        let mut validation = Validation::new(verifying.algorithm);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation.validate_aud = false;

        let token_data = decode::<AccessClaims>(token, &verifying.key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }
}

/// Read claims without checking signature or expiry.
///
/// Only for picking the session id out of a token on logout.
pub fn peek_claims(token: &str) -> Option<AccessClaims> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}
