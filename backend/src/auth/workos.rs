//! Hosted identity provider client (WorkOS User Management API).

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::jwks::{peek_claims, JwksClient, JwtError};
use super::{
    IdentityError, IdentityProvider, ProviderUser, SealedSession, SessionCheck, SessionData,
    SessionFailure, SessionSealer, SessionUser,
};
use crate::config::IdentityConfig;

/// Body of `POST /user_management/authenticate`.
#[derive(Debug, Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum AuthenticateRequest<'a> {
    AuthorizationCode {
        client_id: &'a str,
        client_secret: &'a str,
        code: &'a str,
    },
    RefreshToken {
        client_id: &'a str,
        client_secret: &'a str,
        refresh_token: &'a str,
    },
}

#[derive(Debug, Deserialize)]
struct AuthenticateResponse {
    user: ProviderUser,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Identity provider reached over HTTP, with sessions sealed locally.
pub struct HostedIdentity {
    http_client: Client,
    api_base_url: String,
    client_id: String,
    api_key: String,
    redirect_uri: String,
    return_to: String,
    sealer: SessionSealer,
    jwks: JwksClient,
}

impl HostedIdentity {
    pub fn new(config: &IdentityConfig, return_to: &str) -> Result<Self, IdentityError> {
        let http_client = Client::new();
        let sealer = SessionSealer::new(&config.cookie_password)?;
        let jwks = JwksClient::new(
            http_client.clone(),
            &config.jwks_url(),
            config.issuer.as_deref(),
        );

        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            api_key: config.api_key.clone(),
            redirect_uri: config.redirect_uri.clone(),
            return_to: return_to.to_string(),
            sealer,
            jwks,
        })
    }

    pub fn jwks(&self) -> &JwksClient {
        &self.jwks
    }

    pub fn sealer(&self) -> &SessionSealer {
        &self.sealer
    }

    async fn exchange(&self, request: AuthenticateRequest<'_>) -> Result<SealedSession, IdentityError> {
        let url = format!("{}/user_management/authenticate", self.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_description.or(b.message).or(b.error))
                .unwrap_or(body);
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let auth: AuthenticateResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Http(e.to_string()))?;

        if auth.access_token.is_empty() || auth.refresh_token.is_empty() {
            return Err(IdentityError::NoSession);
        }

        let session_id = peek_claims(&auth.access_token).and_then(|c| c.sid);
        let data = SessionData {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            user: auth.user,
        };
        let sealed = self.sealer.seal(&data)?;

        Ok(SealedSession {
            sealed,
            user: SessionUser::from_provider(data.user, session_id),
        })
    }
}

#[async_trait]
impl IdentityProvider for HostedIdentity {
    fn authorization_url(&self) -> Result<String, IdentityError> {
        let url = Url::parse_with_params(
            &format!("{}/user_management/authorize", self.api_base_url),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("provider", "authkit"),
            ],
        )
        .map_err(|e| IdentityError::Config(e.to_string()))?;
        Ok(url.into())
    }

    async fn authenticate_with_code(&self, code: &str) -> Result<SealedSession, IdentityError> {
        self.exchange(AuthenticateRequest::AuthorizationCode {
            client_id: &self.client_id,
            client_secret: &self.api_key,
            code,
        })
        .await
    }

    async fn authenticate(&self, sealed: Option<&str>) -> SessionCheck {
        let Some(sealed) = sealed else {
            return SessionCheck::Failed(SessionFailure::NoSessionCookie);
        };

        let data = match self.sealer.unseal(sealed) {
            Ok(data) => data,
            Err(e) => return SessionCheck::Failed(SessionFailure::InvalidSession(e.to_string())),
        };

        match self.jwks.verify(&data.access_token).await {
            Ok(claims) if claims.sub == data.user.id => {
                SessionCheck::Authenticated(SessionUser::from_provider(data.user, claims.sid))
            }
            Ok(claims) => SessionCheck::Failed(SessionFailure::InvalidSession(format!(
                "token subject {} does not match session user {}",
                claims.sub, data.user.id
            ))),
            Err(JwtError::Expired) => SessionCheck::NeedsRefresh("access token expired".to_string()),
            Err(e) => SessionCheck::NeedsRefresh(e.to_string()),
        }
    }

    async fn refresh(&self, sealed: &str) -> Result<SealedSession, IdentityError> {
        let data = self
            .sealer
            .unseal(sealed)
            .map_err(|e| IdentityError::InvalidSession(e.to_string()))?;

        self.exchange(AuthenticateRequest::RefreshToken {
            client_id: &self.client_id,
            client_secret: &self.api_key,
            refresh_token: &data.refresh_token,
        })
        .await
    }

    fn logout_url(&self, sealed: Option<&str>) -> String {
        let session_id = sealed
            .and_then(|s| self.sealer.unseal(s).ok())
            .and_then(|data| peek_claims(&data.access_token))
            .and_then(|claims| claims.sid);

        let Some(session_id) = session_id else {
            return self.return_to.clone();
        };

        Url::parse_with_params(
            &format!("{}/user_management/sessions/logout", self.api_base_url),
            &[
                ("session_id", session_id.as_str()),
                ("return_to", self.return_to.as_str()),
            ],
        )
        .map(String::from)
        .unwrap_or_else(|_| self.return_to.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{
        sign_access_token, sign_expired_access_token, test_config, test_provider_user, TEST_KID,
        TEST_SIGNING_SECRET,
    };
    use jsonwebtoken::{Algorithm, DecodingKey};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn identity(api_base_url: &str) -> HostedIdentity {
        let mut config = test_config();
        config.identity.api_base_url = api_base_url.to_string();
        let identity = HostedIdentity::new(&config.identity, &config.webapp.url).unwrap();
        identity
            .jwks()
            .insert_key(
                TEST_KID,
                DecodingKey::from_secret(TEST_SIGNING_SECRET),
                Algorithm::HS256,
            )
            .await;
        identity
    }

    fn seal(identity: &HostedIdentity, access_token: String) -> String {
        identity
            .sealer()
            .seal(&SessionData {
                access_token,
                refresh_token: "refresh_01".to_string(),
                user: test_provider_user("user_01"),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let identity = identity("https://api.workos.test").await;
        let url = identity.authorization_url().unwrap();
        assert!(url.starts_with("https://api.workos.test/user_management/authorize?"));
        assert!(url.contains("client_id=client_test"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("provider=authkit"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A4001%2Fauth%2Fcallback"));
    }

    #[tokio::test]
    async fn test_authenticate_without_cookie() {
        let identity = identity("https://api.workos.test").await;
        assert_eq!(
            identity.authenticate(None).await,
            SessionCheck::Failed(SessionFailure::NoSessionCookie)
        );
    }

    #[tokio::test]
    async fn test_authenticate_valid_session() {
        let identity = identity("https://api.workos.test").await;
        let sealed = seal(&identity, sign_access_token("user_01", Some("session_01")));

        match identity.authenticate(Some(&sealed)).await {
            SessionCheck::Authenticated(user) => {
                assert_eq!(user.id, "user_01");
                assert_eq!(user.session_id.as_deref(), Some("session_01"));
            }
            other => panic!("expected authenticated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authenticate_expired_session_needs_refresh() {
        let identity = identity("https://api.workos.test").await;
        let sealed = seal(&identity, sign_expired_access_token("user_01"));

        assert!(matches!(
            identity.authenticate(Some(&sealed)).await,
            SessionCheck::NeedsRefresh(_)
        ));
    }

    #[tokio::test]
    async fn test_authenticate_garbage_cookie() {
        let identity = identity("https://api.workos.test").await;
        assert!(matches!(
            identity.authenticate(Some("garbage")).await,
            SessionCheck::Failed(SessionFailure::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_subject_mismatch() {
        let identity = identity("https://api.workos.test").await;
        let sealed = seal(&identity, sign_access_token("user_02", None));
        assert!(matches!(
            identity.authenticate(Some(&sealed)).await,
            SessionCheck::Failed(SessionFailure::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_reseals_new_tokens() {
        let mock_server = MockServer::start().await;
        let new_access = sign_access_token("user_01", Some("session_02"));
        Mock::given(method("POST"))
            .and(path("/user_management/authenticate"))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "client_id": "client_test",
                "refresh_token": "refresh_01",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {
                    "id": "user_01",
                    "email": "user_01@example.com",
                    "first_name": "Test",
                },
                "access_token": new_access,
                "refresh_token": "refresh_02",
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let identity = identity(&mock_server.uri()).await;
        let sealed = seal(&identity, sign_expired_access_token("user_01"));

        let refreshed = identity.refresh(&sealed).await.unwrap();
        assert_eq!(refreshed.user.id, "user_01");
        assert_eq!(refreshed.user.session_id.as_deref(), Some("session_02"));

        let data = identity.sealer().unseal(&refreshed.sealed).unwrap();
        assert_eq!(data.refresh_token, "refresh_02");
        assert!(matches!(
            identity.authenticate(Some(&refreshed.sealed)).await,
            SessionCheck::Authenticated(_)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user_management/authenticate"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Refresh token already exchanged.",
            })))
            .mount(&mock_server)
            .await;

        let identity = identity(&mock_server.uri()).await;
        let sealed = seal(&identity, sign_expired_access_token("user_01"));

        match identity.refresh(&sealed).await {
            Err(IdentityError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Refresh token already exchanged.");
            }
            other => panic!("expected rejection, got {:?}", other.map(|s| s.user)),
        }
    }

    #[tokio::test]
    async fn test_refresh_without_tokens_is_no_session() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user_management/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": { "id": "user_01", "email": "user_01@example.com" },
            })))
            .mount(&mock_server)
            .await;

        let identity = identity(&mock_server.uri()).await;
        let sealed = seal(&identity, sign_expired_access_token("user_01"));

        assert!(matches!(
            identity.refresh(&sealed).await,
            Err(IdentityError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_refresh_unsealable_cookie() {
        let identity = identity("https://api.workos.test").await;
        assert!(matches!(
            identity.refresh("garbage").await,
            Err(IdentityError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate_with_code() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user_management/authenticate"))
            .and(body_partial_json(json!({
                "grant_type": "authorization_code",
                "code": "code_01",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": { "id": "user_01", "email": "user_01@example.com" },
                "access_token": sign_access_token("user_01", Some("session_01")),
                "refresh_token": "refresh_01",
            })))
            .mount(&mock_server)
            .await;

        let identity = identity(&mock_server.uri()).await;
        let session = identity.authenticate_with_code("code_01").await.unwrap();
        assert_eq!(session.user.email, "user_01@example.com");
        assert!(identity.sealer().unseal(&session.sealed).is_ok());
    }

    #[tokio::test]
    async fn test_logout_url_uses_session_id() {
        let identity = identity("https://api.workos.test").await;
        let sealed = seal(&identity, sign_access_token("user_01", Some("session_01")));

        let url = identity.logout_url(Some(&sealed));
        assert!(url.starts_with("https://api.workos.test/user_management/sessions/logout?"));
        assert!(url.contains("session_id=session_01"));
    }

    #[tokio::test]
    async fn test_logout_url_without_session_falls_back() {
        let identity = identity("https://api.workos.test").await;
        assert_eq!(identity.logout_url(None), "http://localhost:5173");
        assert_eq!(identity.logout_url(Some("garbage")), "http://localhost:5173");
    }
}
