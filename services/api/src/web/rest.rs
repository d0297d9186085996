//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::web::{auth, bibliography, dashboard, users};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        bibliography::search_handler,
        bibliography::export_handler,
        bibliography::create_handler,
        bibliography::update_handler,
        bibliography::delete_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::change_role_handler,
        users::deactivate_user_handler,
        users::me_handler,
        users::update_preferences_handler,
        dashboard::stats_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            bibliography::BibliographyPayload,
            bibliography::SearchResponse,
            bibliography::CreateBibliographyRequest,
            bibliography::UpdateBibliographyRequest,
            users::UserPayload,
            users::CreateUserRequest,
            users::ChangeRoleRequest,
            users::PreferencesRequest,
            dashboard::DashboardStats,
            dashboard::RecentEntry,
        )
    ),
    tags(
        (name = "Bibliography API", description = "Search, manage, and export bibliographic records.")
    )
)]
pub struct ApiDoc;
