//! Request gate: session lookup and double-submit CSRF enforcement
//! (spec C10 / §4.10).
//!
//! Grounded on `original_source/.../app/middleware.py` for the exempt-path
//! and double-submit logic, and on `original_source/.../app/security.py`
//! for cookie naming.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

use crate::api_server::state::AppState;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Paths that never require a session or CSRF check: vault setup/unlock
/// (no session exists yet), the health probe, and documentation endpoints.
fn is_exempt(path: &str) -> bool {
    matches!(path, "/vault/setup" | "/vault/unlock" | "/health")
        || path.starts_with("/swagger-ui")
        || path.starts_with("/api-docs")
}

fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}

/// Runs before every handler. Safe methods and exempt paths pass through
/// unconditionally; everything else must present a valid session via
/// cookie, and — for state-changing methods — a CSRF cookie/header pair
/// that match each other and the session's stored token.
pub async fn request_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    let method = request.method().clone();

    if is_exempt(&path) {
        return Ok(next.run(request).await);
    }

    if !is_state_changing(&method) {
        return Ok(next.run(request).await);
    }

    let session_token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let session = state.sessions.peek(session_token.as_deref()).ok_or(AppError::Unauthorized)?;

    let csrf_cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let csrf_header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string());

    let (Some(csrf_cookie), Some(csrf_header)) = (csrf_cookie, csrf_header) else {
        return Err(AppError::CsrfInvalid);
    };

    let cookie_matches_header = crate::crypto::constant_time_eq(csrf_cookie.as_bytes(), csrf_header.as_bytes());
    let matches_session = crate::crypto::constant_time_eq(csrf_cookie.as_bytes(), session.csrf_token.as_bytes());

    if !cookie_matches_header || !matches_session {
        return Err(AppError::CsrfInvalid);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempt_paths_cover_setup_unlock_and_health() {
        assert!(is_exempt("/vault/setup"));
        assert!(is_exempt("/vault/unlock"));
        assert!(is_exempt("/health"));
        assert!(is_exempt("/swagger-ui/index.html"));
        assert!(!is_exempt("/entries"));
    }

    #[test]
    fn only_state_changing_methods_require_csrf() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::OPTIONS));
    }
}
