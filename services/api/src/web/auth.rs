//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout. Signup
//! always creates a standard-role account; elevated accounts are created
//! administratively through the users endpoints.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use biblio_core::domain::{NewUser, Role};
use biblio_core::ports::CoreError;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::http_error;
use crate::web::middleware::session_from_cookies;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn session_cookie(session_id: &str, max_age_secs: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id, max_age_secs
    )
}

/// Maps a credential-lookup failure for login. An unknown email gets the
/// same 401 as a wrong password so emails cannot be enumerated; any other
/// failure (a store outage, say) must surface as what it is.
fn login_error(error: CoreError) -> (StatusCode, String) {
    match error {
        CoreError::NotFound(_) => bad_credentials(),
        other => http_error(other),
    }
}

fn bad_credentials() -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
}

pub(crate) fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new standard-role account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Missing email, name, or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    NewUser::validate(&req.email, &req.name, &req.password).map_err(http_error)?;

    let hashed_password = hash_password(&req.password)?;
    let account = state
        .db
        .create_user(&NewUser {
            email: req.email,
            name: req.name,
            hashed_password,
            role: Role::Standard,
        })
        .await
        .map_err(http_error)?;

    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    state
        .db
        .create_auth_session(&auth_session_id, account.id, Utc::now() + ttl)
        .await
        .map_err(http_error)?;

    let cookie = session_cookie(&auth_session_id, ttl.num_seconds());
    let response = AuthResponse {
        user_id: account.id,
        email: account.email,
        name: account.name,
        role: account.role.as_str().to_string(),
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or deactivated account"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let credentials = state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(login_error)?;

    let parsed_hash = PasswordHash::new(&credentials.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(bad_credentials());
    }
    if !credentials.is_active {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Account is deactivated".to_string(),
        ));
    }

    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = Duration::days(state.config.session_ttl_days);
    state
        .db
        .create_auth_session(&auth_session_id, credentials.user_id, Utc::now() + ttl)
        .await
        .map_err(http_error)?;
    state
        .db
        .record_login(credentials.user_id)
        .await
        .map_err(http_error)?;

    let cookie = session_cookie(&auth_session_id, ttl.num_seconds());
    let account = state
        .db
        .get_user(credentials.user_id)
        .await
        .map_err(http_error)?;
    let response = AuthResponse {
        user_id: account.id,
        email: account.email,
        name: account.name,
        role: account.role.as_str().to_string(),
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    let auth_session_id = session_from_cookies(cookie_header)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(http_error)?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_emails_and_outages_map_to_different_statuses() {
        // An unknown email is indistinguishable from a wrong password.
        let (status, body) = login_error(CoreError::NotFound("no such account".to_string()));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid email or password");

        // A store failure is not a credential problem.
        let (status, _) = login_error(CoreError::Retrieval("pool timed out".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
