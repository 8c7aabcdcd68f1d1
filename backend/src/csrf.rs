//! CSRF protection using the double-submit cookie pattern.
//!
//! `GET /csrf-token` hands out a random token and stores the same value in
//! an http-only cookie. State-changing requests must echo it back in the
//! `X-CSRF-Token` header.

use axum::extract::Request;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rand::RngCore;
use subtle::ConstantTimeEq;

use memory_lane_common::CsrfTokenResponse;

use crate::auth::cookies::{parse_cookie, set_cookie, CSRF_COOKIE};
use crate::error::ApiError;

pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_BYTES: usize = 32;

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether the header token matches the cookie token.
pub fn tokens_match(headers: &HeaderMap) -> bool {
    let Some(cookie) = parse_cookie(headers, CSRF_COOKIE) else {
        return false;
    };
    let Some(header) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    is_well_formed(&cookie)
        && cookie.len() == header.len()
        && bool::from(cookie.as_bytes().ct_eq(header.as_bytes()))
}

/// GET /csrf-token - Issue (or re-issue) the caller's CSRF token
async fn csrf_token(headers: HeaderMap) -> Result<Response, ApiError> {
    let token = parse_cookie(&headers, CSRF_COOKIE)
        .filter(|t| is_well_formed(t))
        .unwrap_or_else(generate_token);

    let cookie = set_cookie(CSRF_COOKIE, &token).map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [(SET_COOKIE, cookie)],
        Json(CsrfTokenResponse { csrf_token: token }),
    )
        .into_response())
}

/// Middleware rejecting state-changing requests without a matching token.
pub async fn verify_csrf(request: Request, next: Next) -> Response {
    let safe = matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    );

    if !safe && !tokens_match(request.headers()) {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request with missing or mismatched CSRF token"
        );
        return ApiError::InvalidCsrfToken.into_response();
    }

    next.run(request).await
}

pub fn router() -> Router {
    Router::new().route("/csrf-token", get(csrf_token))
}
