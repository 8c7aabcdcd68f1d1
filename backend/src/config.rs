//! Configuration for the Memory Lane API server.

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;

/// Minimum length of the cookie password used to derive the sealing key.
pub const MIN_COOKIE_PASSWORD_LEN: usize = 32;

/// Application configuration, built once at startup and handed to `AppState`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub images: ImagesConfig,
    pub webapp: WebappConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite path, optionally prefixed with `sqlite:`. `:memory:` is allowed.
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Hosted identity provider (WorkOS User Management) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_api")]
    pub api_base_url: String,
    pub client_id: String,
    pub api_key: String,
    /// Secret the session sealing key is derived from.
    pub cookie_password: String,
    /// Absolute URL of this server's `/auth/callback`.
    pub redirect_uri: String,
    /// Expected `iss` claim of access tokens. Not enforced when unset.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Overrides the JWKS location derived from the client id.
    #[serde(default)]
    pub jwks_url: Option<String>,
}

impl IdentityConfig {
    pub fn jwks_url(&self) -> String {
        self.jwks_url.clone().unwrap_or_else(|| {
            format!(
                "{}/sso/jwks/{}",
                self.api_base_url.trim_end_matches('/'),
                self.client_id
            )
        })
    }
}

/// Hosted image storage (Cloudinary) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_images_api")]
    pub api_base_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_images_folder")]
    pub folder: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebappConfig {
    /// Where the browser lands after login and logout.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated origins; `*` allows any origin without credentials.
    #[serde(default = "default_cors_origins")]
    pub origins: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("identity.cookie_password must be at least 32 characters")]
    CookiePasswordTooShort,
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    4001
}
fn default_database_url() -> String {
    "sqlite:./data/memory-lane.db".to_string()
}
fn default_identity_api() -> String {
    "https://api.workos.com".to_string()
}
fn default_images_api() -> String {
    "https://api.cloudinary.com".to_string()
}
fn default_images_folder() -> String {
    "memory-lane".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (MEMORY_LANE__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("MEMORY_LANE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.client_id.trim().is_empty() {
            return Err(ConfigError::MissingSetting("identity.client_id"));
        }
        if self.identity.cookie_password.len() < MIN_COOKIE_PASSWORD_LEN {
            return Err(ConfigError::CookiePasswordTooShort);
        }
        if self.webapp.url.trim().is_empty() {
            return Err(ConfigError::MissingSetting("webapp.url"));
        }
        Ok(())
    }

    /// Allowed CORS origins, or `None` when any origin is allowed.
    pub fn cors_origins(&self) -> Option<Vec<String>> {
        let origins = self.cors.origins.trim();
        if origins == "*" || origins.is_empty() {
            return None;
        }
        Some(
            origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_config;

    #[test]
    fn test_default_server_config() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 4001);
    }

    #[test]
    fn test_jwks_url_derived_from_client_id() {
        let mut config = test_config();
        config.identity.api_base_url = "https://api.workos.com/".to_string();
        config.identity.client_id = "client_123".to_string();
        config.identity.jwks_url = None;
        assert_eq!(
            config.identity.jwks_url(),
            "https://api.workos.com/sso/jwks/client_123"
        );
    }

    #[test]
    fn test_validate_short_cookie_password() {
        let mut config = test_config();
        config.identity.cookie_password = "short".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CookiePasswordTooShort)
        ));
    }

    #[test]
    fn test_validate_missing_client_id() {
        let mut config = test_config();
        config.identity.client_id = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingSetting("identity.client_id"))
        ));
    }

    #[test]
    fn test_cors_origins_parsing() {
        let mut config = test_config();
        config.cors.origins = "*".to_string();
        assert!(config.cors_origins().is_none());

        config.cors.origins = "https://a.example, https://b.example,".to_string();
        assert_eq!(
            config.cors_origins().unwrap(),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
