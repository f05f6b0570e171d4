//! Session cookie handling for HTTP requests.

use crate::db::session::mask_token;
use crate::gateway::AppState;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use std::time::Duration;
use tracing::debug;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

const COOKIE_ATTRIBUTES: &str = "Path=/; HttpOnly; SameSite=Lax";
const UNIX_EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// The session's connection, injected into request extensions by
/// [`require_session`].
#[derive(Debug, Clone)]
pub struct SessionConnection(pub MySqlPool);

/// Resolve the session cookie and inject its connection, or answer 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = session_token(request.headers()).map(str::to_owned) else {
        debug!("Rejected request without session cookie");
        return unauthorized_response();
    };

    match state.sessions().get(&token).await {
        Ok(pool) => {
            request.extensions_mut().insert(SessionConnection(pool));
            next.run(request).await
        }
        Err(e) => {
            debug!(token = %mask_token(&token), reason = %e, "Rejected request with invalid session");
            unauthorized_response()
        }
    }
}

/// Extract the session token from the request's `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value for a new session.
pub fn session_cookie(token: &str, max_age: Duration, expires_at: DateTime<Utc>) -> String {
    format!(
        "{}={}; {}; Max-Age={}; Expires={}",
        SESSION_COOKIE,
        token,
        COOKIE_ATTRIBUTES,
        max_age.as_secs(),
        http_date(expires_at)
    )
}

/// `Set-Cookie` value that makes the client drop the session cookie.
pub fn expired_cookie() -> String {
    format!(
        "{}=; {}; Max-Age=0; Expires={}",
        SESSION_COOKIE,
        COOKIE_ATTRIBUTES,
        UNIX_EPOCH_HTTP_DATE
    )
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": "Unauthorized" })),
    )
        .into_response()
}
