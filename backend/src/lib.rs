pub mod auth;
pub mod config;
pub mod csrf;
pub mod error;
pub mod images;
pub mod logging;
pub mod models;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::{HostedIdentity, IdentityProvider, SessionUser};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use images::{CloudinaryImageHost, ImageHost};
pub use store::{Store, StoreError};

use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Store,
    /// Hosted identity provider; swapped for a fake in tests.
    pub identity: Arc<dyn IdentityProvider>,
    pub images: Arc<dyn ImageHost>,
}
