//! Session-cookie and bearer-token resolution for authenticated routes.

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use uuid::Uuid;

use crate::api::state::{SecurityConfig, SecurityState};
use crate::session::hash_session_token;

pub(crate) const SESSION_COOKIE_NAME: &str = "jobtrail_session";

/// The authenticated caller behind a request.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Principal {
    pub(crate) user_id: Uuid,
    pub(crate) session_id: Uuid,
}

/// Resolve the caller from the session cookie or bearer token. Missing or
/// stale credentials read as plain 401 to avoid leaking auth state.
pub(crate) fn require_session(
    headers: &HeaderMap,
    state: &SecurityState,
) -> Result<Principal, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    // Only the hash is stored; raw tokens are never compared.
    let token_hash = hash_session_token(&token);
    let Some(session) = state.sessions().find_active_by_token_hash(&token_hash) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    // Best-effort activity bump; the spec does not require it per request.
    state.sessions().touch(session.id);

    Ok(Principal {
        user_id: session.user_id,
        session_id: session.id,
    })
}

/// Build the secure `HttpOnly` cookie carrying the session token.
pub(crate) fn session_cookie(
    config: &SecurityConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(
    config: &SecurityConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Attach the session cookie (and a bearer echo) to a response header map.
pub(crate) fn attach_session_headers(
    headers: &mut HeaderMap,
    config: &SecurityConfig,
    token: &str,
) -> Result<(), InvalidHeaderValue> {
    headers.insert(SET_COOKIE, session_cookie(config, token)?);
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    Ok(())
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Extract the client IP from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Geo attributes resolved by the edge, if present.
pub(crate) fn extract_geo(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    (header_value("x-geo-country"), header_value("x-geo-city"))
}
