//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the authenticated-principal
//! type handlers pull out of request extensions.

use std::sync::Arc;

use biblio_core::domain::Role;
use biblio_core::ports::DatabaseService;
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::web::dashboard::DashboardStats;

/// The shared application state, created once at startup and passed to all
/// handlers.
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// Read-through cache for the dashboard endpoint; explicitly owned here
    /// rather than living as module-global state.
    pub dashboard_cache: TtlCache<&'static str, DashboardStats>,
}

/// The authenticated principal resolved by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}
