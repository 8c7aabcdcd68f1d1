pub mod auth;
pub mod health;
pub mod memories;
pub mod upload;
pub mod users;

use std::sync::Arc;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_session;
use crate::csrf::{self, verify_csrf, CSRF_HEADER};
use crate::logging::request_logger;
use crate::AppState;

/// Routes that need a signed-in caller. CSRF is checked before the session.
fn protected(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(memories::protected())
        .merge(users::protected())
        .merge(upload::protected())
        .route_layer(middleware::from_fn_with_state(state, require_session))
        .route_layer(middleware::from_fn(verify_csrf))
}

fn public() -> Router<Arc<AppState>> {
    Router::new()
        .merge(memories::public())
        .merge(users::public())
        .merge(auth::router())
}

fn cors(state: &AppState) -> CorsLayer {
    match state.config.cors_origins() {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([CONTENT_TYPE, HeaderName::from_static(CSRF_HEADER)])
                .allow_credentials(true)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// The complete application router.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors(&state);

    Router::new()
        .merge(public())
        .merge(protected(state.clone()))
        .with_state(state)
        .merge(health::router())
        .merge(csrf::router())
        .layer(middleware::from_fn(request_logger))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
