//! Shared fixtures for unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::auth::{
    IdentityError, IdentityProvider, ProviderUser, SealedSession, SessionCheck, SessionFailure,
    SessionUser,
};
use crate::config::{
    Config, CorsConfig, DatabaseConfig, IdentityConfig, ImagesConfig, LoggingConfig,
    ServerConfig, WebappConfig,
};
use crate::images::{ImageError, ImageHost, ImageUpload};
use crate::store::Store;
use crate::AppState;

pub const TEST_KID: &str = "test-key-1";
pub const TEST_SIGNING_SECRET: &[u8] = b"memory-lane-test-signing-secret";
pub const TEST_ISSUER: &str = "https://test-issuer";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 4001,
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
        },
        identity: IdentityConfig {
            api_base_url: "https://api.workos.test".to_string(),
            client_id: "client_test".to_string(),
            api_key: "sk_test_key".to_string(),
            cookie_password: "a-test-cookie-password-that-is-long-enough".to_string(),
            redirect_uri: "http://localhost:4001/auth/callback".to_string(),
            issuer: None,
            jwks_url: None,
        },
        images: ImagesConfig {
            api_base_url: "https://api.cloudinary.test".to_string(),
            cloud_name: "test-cloud".to_string(),
            api_key: "cloud-key".to_string(),
            api_secret: "cloud-secret".to_string(),
            folder: "memory-lane-test".to_string(),
        },
        webapp: WebappConfig {
            url: "http://localhost:5173".to_string(),
        },
        cors: CorsConfig {
            origins: "*".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
        },
    }
}

#[derive(serde::Serialize)]
struct TestClaims {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    iss: String,
    exp: i64,
    iat: i64,
}

fn sign(claims: &TestClaims) -> String {
    let header = Header {
        alg: Algorithm::HS256,
        kid: Some(TEST_KID.to_string()),
        ..Default::default()
    };
    encode(&header, claims, &EncodingKey::from_secret(TEST_SIGNING_SECRET))
        .expect("Failed to encode JWT")
}

/// Access token valid for an hour, signed with the test key.
pub fn sign_access_token(sub: &str, sid: Option<&str>) -> String {
    let now = Utc::now();
    sign(&TestClaims {
        sub: sub.to_string(),
        sid: sid.map(String::from),
        iss: TEST_ISSUER.to_string(),
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    })
}

pub fn sign_expired_access_token(sub: &str) -> String {
    let now = Utc::now();
    sign(&TestClaims {
        sub: sub.to_string(),
        sid: None,
        iss: TEST_ISSUER.to_string(),
        exp: (now - Duration::hours(1)).timestamp(),
        iat: (now - Duration::hours(2)).timestamp(),
    })
}

pub fn test_provider_user(id: &str) -> ProviderUser {
    ProviderUser {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        first_name: Some("Test".to_string()),
        last_name: Some(id.to_string()),
        profile_picture_url: Some(format!("https://img.example.com/{}.png", id)),
    }
}

pub fn test_session_user(id: &str) -> SessionUser {
    SessionUser::from_provider(test_provider_user(id), Some(format!("session_{}", id)))
}

/// What a cookie value means to [`FakeIdentity`].
#[derive(Debug, Clone, Copy)]
pub enum FakeSession {
    Valid(&'static str),
    Expired(&'static str),
}

/// In-memory identity provider. Cookie values are opaque keys into a table.
#[derive(Default)]
pub struct FakeIdentity {
    sessions: Mutex<HashMap<String, FakeSession>>,
    refreshes: HashMap<String, String>,
    codes: HashMap<String, String>,
    refresh_calls: AtomicUsize,
}

impl FakeIdentity {
    pub const AUTHORIZATION_URL: &'static str = "https://auth.example.test/authorize";
    pub const LOGOUT_URL: &'static str = "https://auth.example.test/logout";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, sealed: &str, session: FakeSession) -> Self {
        self.insert(sealed, session);
        self
    }

    /// Refreshing `old` yields the cookie `new`, valid for the same user.
    pub fn with_refresh(mut self, old: &str, new: &str) -> Self {
        self.refreshes.insert(old.to_string(), new.to_string());
        self
    }

    /// Login callback `code` yields the cookie `sealed`, valid for `user_id`.
    pub fn with_code(mut self, code: &str, sealed: &str, user_id: &'static str) -> Self {
        self.insert(sealed, FakeSession::Valid(user_id));
        self.codes.insert(code.to_string(), sealed.to_string());
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn insert(&self, sealed: &str, session: FakeSession) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(sealed.to_string(), session);
        }
    }

    fn lookup(&self, sealed: &str) -> Option<FakeSession> {
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(sealed).copied())
    }

    fn sealed_session(&self, sealed: &str) -> Result<SealedSession, IdentityError> {
        match self.lookup(sealed) {
            Some(FakeSession::Valid(id)) | Some(FakeSession::Expired(id)) => Ok(SealedSession {
                sealed: sealed.to_string(),
                user: test_session_user(id),
            }),
            None => Err(IdentityError::InvalidSession("unknown session".to_string())),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    fn authorization_url(&self) -> Result<String, IdentityError> {
        Ok(Self::AUTHORIZATION_URL.to_string())
    }

    async fn authenticate_with_code(&self, code: &str) -> Result<SealedSession, IdentityError> {
        match self.codes.get(code) {
            Some(sealed) => self.sealed_session(sealed),
            None => Err(IdentityError::Rejected {
                status: 400,
                message: "invalid_grant".to_string(),
            }),
        }
    }

    async fn authenticate(&self, sealed: Option<&str>) -> SessionCheck {
        let Some(sealed) = sealed else {
            return SessionCheck::Failed(SessionFailure::NoSessionCookie);
        };
        match self.lookup(sealed) {
            Some(FakeSession::Valid(id)) => SessionCheck::Authenticated(test_session_user(id)),
            Some(FakeSession::Expired(_)) => {
                SessionCheck::NeedsRefresh("access token expired".to_string())
            }
            None => SessionCheck::Failed(SessionFailure::InvalidSession(
                "unknown session".to_string(),
            )),
        }
    }

    async fn refresh(&self, sealed: &str) -> Result<SealedSession, IdentityError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);

        let user_id = match self.lookup(sealed) {
            Some(FakeSession::Valid(id)) | Some(FakeSession::Expired(id)) => id,
            None => return Err(IdentityError::InvalidSession("unknown session".to_string())),
        };
        let Some(new) = self.refreshes.get(sealed) else {
            return Err(IdentityError::Rejected {
                status: 400,
                message: "refresh token revoked".to_string(),
            });
        };

        self.insert(new, FakeSession::Valid(user_id));
        self.sealed_session(new)
    }

    fn logout_url(&self, sealed: Option<&str>) -> String {
        match sealed.and_then(|s| self.lookup(s)) {
            Some(_) => format!("{}?session=1", Self::LOGOUT_URL),
            None => Self::LOGOUT_URL.to_string(),
        }
    }
}

/// Image host that records uploads instead of sending them anywhere.
#[derive(Default)]
pub struct FakeImageHost {
    uploads: Mutex<Vec<ImageUpload>>,
    fail: bool,
}

impl FakeImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn uploads(&self) -> Vec<ImageUpload> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<String, ImageError> {
        if self.fail {
            return Err(ImageError::Upload("connection refused".to_string()));
        }
        let url = format!("https://images.example.test/{}", image.public_id);
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(image);
        }
        Ok(url)
    }
}

/// App state over an in-memory store and the given fakes.
pub fn test_state(identity: Arc<dyn IdentityProvider>, images: Arc<dyn ImageHost>) -> Arc<AppState> {
    let config = test_config();
    let store = Store::new(&config.database.url).expect("Failed to open in-memory store");
    Arc::new(AppState {
        config,
        store,
        identity,
        images,
    })
}
