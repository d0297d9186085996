//! services/api/src/web/users.rs
//!
//! Administrative user-management endpoints, plus the self-service profile
//! endpoints. Two invariants live here rather than in the permission table:
//! a principal never deactivates its own account, and only a super admin
//! creates elevated accounts or changes roles.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use biblio_core::access::{ensure_not_self, ensure_role_change_allowed, require, Capability};
use biblio_core::domain::{NewUser, NotificationPreferences, Role, UserAccount, UserPreferences};
use biblio_core::ports::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::http_error;
use crate::web::auth::hash_password;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One account as returned to clients. Password material never appears.
#[derive(Serialize, ToSchema)]
pub struct UserPayload {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub language: String,
    pub timezone: String,
    pub notify_email: bool,
    pub notify_browser: bool,
    pub total_bibliographies: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub role_changed_by: Option<Uuid>,
    pub role_changed_at: Option<DateTime<Utc>>,
}

impl From<UserAccount> for UserPayload {
    fn from(account: UserAccount) -> Self {
        Self {
            id: account.id,
            email: account.email,
            name: account.name,
            role: account.role.as_str().to_string(),
            is_active: account.is_active,
            language: account.preferences.language,
            timezone: account.preferences.timezone,
            notify_email: account.preferences.notifications.email,
            notify_browser: account.preferences.notifications.browser,
            total_bibliographies: account.statistics.total_bibliographies,
            last_login: account.statistics.last_login,
            created_at: account.statistics.created_at,
            role_changed_by: account.role_changed_by,
            role_changed_at: account.role_changed_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    /// One of "standard", "admin", "super_admin"; defaults to standard.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: String,
}

#[derive(Deserialize, ToSchema)]
pub struct PreferencesRequest {
    pub language: String,
    pub timezone: String,
    pub notify_email: bool,
    pub notify_browser: bool,
}

fn parse_requested_role(value: &str) -> Result<Role, (StatusCode, String)> {
    Role::parse(value).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a valid role", value),
        )
    })
}

//=========================================================================================
// Administrative Handlers
//=========================================================================================

/// GET /users - List all accounts.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All accounts", body = [UserPayload]),
        (status = 403, description = "Role lacks the manage-users capability")
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::ManageUsers).map_err(http_error)?;

    let accounts = state.db.list_users().await.map_err(http_error)?;
    let payloads: Vec<UserPayload> = accounts.into_iter().map(Into::into).collect();
    Ok(Json(payloads))
}

/// POST /users - Create an account administratively.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserPayload),
        (status = 400, description = "Missing field or unknown role"),
        (status = 403, description = "Not allowed to create this account"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::ManageUsers).map_err(http_error)?;

    let role = match req.role.as_deref() {
        None | Some("") => Role::Standard,
        Some(value) => parse_requested_role(value)?,
    };
    // Elevated accounts are minted by super admins only.
    if role != Role::Standard && user.role != Role::SuperAdmin {
        return Err(http_error(CoreError::Authorization(
            "only a super admin may create admin accounts".to_string(),
        )));
    }

    NewUser::validate(&req.email, &req.name, &req.password).map_err(http_error)?;
    let hashed_password = hash_password(&req.password)?;
    let account = state
        .db
        .create_user(&NewUser {
            email: req.email,
            name: req.name,
            hashed_password,
            role,
        })
        .await
        .map_err(http_error)?;

    info!(id = %account.id, role = role.as_str(), "account created administratively");
    Ok((StatusCode::CREATED, Json(UserPayload::from(account))))
}

/// PUT /users/{id}/role - Change an account's role.
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    request_body = ChangeRoleRequest,
    params(("id" = Uuid, Path, description = "Account identifier")),
    responses(
        (status = 200, description = "Role changed", body = UserPayload),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Only a super admin may change roles"),
        (status = 404, description = "No such account")
    )
)]
pub async fn change_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Role changes sit above manage-users: super admin only, whoever the
    // target is.
    ensure_role_change_allowed(user.role).map_err(http_error)?;

    let role = parse_requested_role(&req.role)?;
    let account = state
        .db
        .set_user_role(id, role, user.id)
        .await
        .map_err(http_error)?;
    info!(%id, role = role.as_str(), changed_by = %user.id, "role changed");
    Ok(Json(UserPayload::from(account)))
}

/// DELETE /users/{id} - Deactivate an account (soft delete).
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "Account identifier")),
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 403, description = "Not allowed, or attempted self-deactivation"),
        (status = 404, description = "No such account")
    )
)]
pub async fn deactivate_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::DeleteUsers).map_err(http_error)?;

    // Self-deactivation is forbidden regardless of role.
    ensure_not_self(user.id, id).map_err(http_error)?;

    state.db.deactivate_user(id).await.map_err(http_error)?;
    info!(%id, by = %user.id, "account deactivated");
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Self-service Handlers
//=========================================================================================

/// GET /users/me - The authenticated account's own profile.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The caller's account", body = UserPayload),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let account = state.db.get_user(user.id).await.map_err(http_error)?;
    Ok(Json(UserPayload::from(account)))
}

/// PUT /users/me/preferences - Update the caller's own preferences.
#[utoipa::path(
    put,
    path = "/users/me/preferences",
    request_body = PreferencesRequest,
    responses(
        (status = 200, description = "Preferences updated", body = UserPayload),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<PreferencesRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let preferences = UserPreferences {
        language: req.language,
        timezone: req.timezone,
        notifications: NotificationPreferences {
            email: req.notify_email,
            browser: req.notify_browser,
        },
    };
    state
        .db
        .update_user_preferences(user.id, &preferences)
        .await
        .map_err(http_error)?;
    let account = state.db.get_user(user.id).await.map_err(http_error)?;
    Ok(Json(UserPayload::from(account)))
}
