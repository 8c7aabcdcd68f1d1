//! Session guard.
//!
//! Per request: no cookie means the caller is sent to log in; a valid
//! session lets the request through; anything else is treated as expired
//! and gets exactly one refresh attempt. A successful refresh rewrites the
//! cookie and replays the original URL; a failed one clears the cookie.
//! Nothing survives between requests except the sealed cookie itself.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::cookies::{clear_cookie, parse_cookie, set_cookie, SESSION_COOKIE};
use super::{IdentityProvider, SealedSession, SessionCheck, SessionFailure, SessionUser};
use crate::error::ApiError;
use crate::AppState;

/// Where unauthenticated browsers are sent.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone)]
pub enum GuardState {
    NoCookie,
    Authenticated(SessionUser),
    /// Verification failed for a reason other than a missing cookie.
    Expired(String),
    RefreshSucceeded(SealedSession),
    RefreshFailed(String),
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GuardState::Expired(_))
    }
}

/// First step: look at the cookie and ask the provider about it.
async fn check(provider: &dyn IdentityProvider, sealed: Option<&str>) -> GuardState {
    if sealed.is_none() {
        return GuardState::NoCookie;
    }

    match provider.authenticate(sealed).await {
        SessionCheck::Authenticated(user) => GuardState::Authenticated(user),
        SessionCheck::NeedsRefresh(reason) => GuardState::Expired(reason),
        SessionCheck::Failed(SessionFailure::NoSessionCookie) => GuardState::NoCookie,
        SessionCheck::Failed(failure) => GuardState::Expired(failure.to_string()),
    }
}

/// Second step, only from `Expired`: one refresh exchange.
async fn refresh(provider: &dyn IdentityProvider, sealed: &str, reason: &str) -> GuardState {
    tracing::debug!("Session needs refresh: {}", reason);

    match provider.refresh(sealed).await {
        Ok(session) => GuardState::RefreshSucceeded(session),
        Err(e) => GuardState::RefreshFailed(e.to_string()),
    }
}

/// Run the guard to a terminal state.
pub async fn evaluate(provider: &dyn IdentityProvider, sealed: Option<&str>) -> GuardState {
    let state = check(provider, sealed).await;

    if let (GuardState::Expired(reason), Some(sealed)) = (&state, sealed) {
        return refresh(provider, sealed, reason).await;
    }
    state
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

/// Login redirect for browsers, JSON 403 for API callers.
fn deny(headers: &HeaderMap, clear_session: bool) -> Response {
    let mut response = if wants_html(headers) {
        Redirect::to(LOGIN_PATH).into_response()
    } else {
        ApiError::Unauthenticated.into_response()
    };

    if clear_session {
        response
            .headers_mut()
            .append(SET_COOKIE, clear_cookie(SESSION_COOKIE));
    }
    response
}

/// Re-issue the original request so the browser retries with the new cookie.
fn replay(request: &Request, cookie: HeaderValue) -> Response {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
    if let Ok(location) = HeaderValue::from_str(&target) {
        response.headers_mut().insert(LOCATION, location);
    }
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

/// Middleware gating every endpoint that needs a signed-in caller.
///
/// On success the `SessionUser` is added to the request extensions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let sealed = parse_cookie(request.headers(), SESSION_COOKIE);
    let path = request.uri().path().to_string();

    match evaluate(state.identity.as_ref(), sealed.as_deref()).await {
        GuardState::Authenticated(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        GuardState::NoCookie => {
            tracing::debug!(path = %path, "No session cookie");
            deny(request.headers(), false)
        }
        GuardState::RefreshSucceeded(session) => match set_cookie(SESSION_COOKIE, &session.sealed) {
            Ok(cookie) => {
                tracing::info!(path = %path, user_id = %session.user.id, "Session refreshed");
                replay(&request, cookie)
            }
            Err(e) => {
                tracing::warn!(path = %path, "Refreshed session is not a valid cookie: {}", e);
                deny(request.headers(), true)
            }
        },
        GuardState::RefreshFailed(reason) => {
            tracing::warn!(path = %path, "Session refresh failed: {}", reason);
            deny(request.headers(), true)
        }
        GuardState::Expired(reason) => {
            tracing::warn!(path = %path, "Session guard stopped before refreshing: {}", reason);
            deny(request.headers(), true)
        }
    }
}

/// Identify the caller without requiring, refreshing, or rewriting a session.
pub async fn current_user(state: &AppState, headers: &HeaderMap) -> Option<SessionUser> {
    let sealed = parse_cookie(headers, SESSION_COOKIE);

    match state.identity.authenticate(sealed.as_deref()).await {
        SessionCheck::Authenticated(user) => Some(user),
        SessionCheck::NeedsRefresh(reason) => {
            tracing::debug!("Ignoring stale session: {}", reason);
            None
        }
        SessionCheck::Failed(SessionFailure::NoSessionCookie) => None,
        SessionCheck::Failed(failure) => {
            tracing::debug!("Ignoring session: {}", failure);
            None
        }
    }
}
