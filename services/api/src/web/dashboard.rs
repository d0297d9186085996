//! services/api/src/web/dashboard.rs
//!
//! The dashboard endpoint: real aggregate counts plus the most recent
//! records, read through the TTL cache owned by `AppState`. No placeholder
//! figures; everything here comes from the store.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use biblio_core::access::{require, Capability};
use biblio_core::query::{self, SearchQuery};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::http_error;
use crate::web::state::{AppState, CurrentUser};

/// The single cache key for dashboard stats; mutating handlers invalidate it.
pub const STATS_KEY: &str = "dashboard_stats";

const RECENT_LIMIT: u32 = 5;

/// Aggregate figures shown on the dashboard.
#[derive(Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_bibliographies: u64,
    pub total_users: u64,
    pub recent: Vec<RecentEntry>,
}

/// A compact listing of one recently added record.
#[derive(Clone, Serialize, ToSchema)]
pub struct RecentEntry {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: String,
}

/// GET /dashboard/stats - Aggregate counts and recently added records.
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard figures", body = DashboardStats),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::View).map_err(http_error)?;

    if let Some(stats) = state.dashboard_cache.get(&STATS_KEY) {
        return Ok(Json(stats));
    }

    let total_bibliographies = state.db.count_bibliographies().await.map_err(http_error)?;
    let total_users = state.db.count_users().await.map_err(http_error)?;
    // Default sort is descending by id, i.e. most recently created first.
    let recent_query = SearchQuery {
        page: 1,
        limit: Some(RECENT_LIMIT),
        ..Default::default()
    };
    let results = query::search(state.db.as_ref(), &recent_query)
        .await
        .map_err(http_error)?;

    let stats = DashboardStats {
        total_bibliographies,
        total_users,
        recent: results
            .records
            .into_iter()
            .map(|record| RecentEntry {
                id: record.id,
                title: record.title,
                author: record.author,
                year: record.year,
            })
            .collect(),
    };
    state.dashboard_cache.put(STATS_KEY, stats.clone());
    Ok(Json(stats))
}
