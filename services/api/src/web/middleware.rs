//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::{AppState, CurrentUser};

/// Extracts the session id from a Cookie header value.
pub fn session_from_cookies(cookie_header: &str) -> Option<&str> {
    cookie_header.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("session=")
    })
}

/// Middleware that validates the auth session cookie and resolves the
/// acting principal.
///
/// On success, a `CurrentUser { id, role }` is inserted into request
/// extensions for handlers to use. Missing or invalid sessions, and
/// deactivated accounts, yield 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let auth_session_id =
        session_from_cookies(cookie_header).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    // The role (and active flag) must reflect the account as stored now,
    // not as it was when the session was minted.
    let account = state.db.get_user(user_id).await.map_err(|e| {
        error!("Failed to load account for session: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;
    if !account.is_active {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut().insert(CurrentUser {
        id: account.id,
        role: account.role,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_parsing() {
        assert_eq!(
            session_from_cookies("theme=dark; session=abc123; lang=en"),
            Some("abc123")
        );
        assert_eq!(session_from_cookies("session=xyz"), Some("xyz"));
        assert_eq!(session_from_cookies("theme=dark"), None);
        assert_eq!(session_from_cookies(""), None);
    }
}
