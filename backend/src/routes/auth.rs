//! Login, logout and the provider's login callback.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use memory_lane_common::{PayloadError, WhoAmIResponse};

use crate::auth::cookies::{clear_cookie, parse_cookie, set_cookie, SESSION_COOKIE};
use crate::auth::session::LOGIN_PATH;
use crate::auth::current_user;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// GET /login - Send the browser to the hosted login page
async fn login(State(state): State<Arc<AppState>>) -> ApiResult<Redirect> {
    let url = state.identity.authorization_url()?;
    Ok(Redirect::to(&url))
}

/// GET /auth/callback - Exchange the login code for a session cookie
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Response> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(PayloadError::MissingField("code"))?;

    let session = match state.identity.authenticate_with_code(&code).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("Login callback failed: {}", e);
            return Ok(Redirect::to(LOGIN_PATH).into_response());
        }
    };

    let cookie = set_cookie(SESSION_COOKIE, &session.sealed)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::info!(user_id = %session.user.id, "User signed in");

    Ok((
        [(SET_COOKIE, cookie)],
        Redirect::to(&state.config.webapp.url),
    )
        .into_response())
}

/// GET /logout - Drop the session cookie and end the provider session
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let sealed = parse_cookie(&headers, SESSION_COOKIE);
    let url = state.identity.logout_url(sealed.as_deref());

    (
        [(SET_COOKIE, clear_cookie(SESSION_COOKIE))],
        Redirect::to(&url),
    )
        .into_response()
}

/// GET /whoami - The caller's user id, or `{}` when anonymous
async fn whoami(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<WhoAmIResponse> {
    let user = current_user(&state, &headers).await;
    Json(WhoAmIResponse {
        user_id: user.map(|u| u.id),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/auth/callback", get(callback))
        .route("/whoami", get(whoami))
}
