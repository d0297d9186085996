//! services/api/src/web/bibliography.rs
//!
//! Handlers for browsing, searching, mutating, and exporting bibliography
//! records. Every mutating handler checks the acting role's capability
//! before touching the store; deletes are hard deletes, applied uniformly.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use biblio_core::access::{require, Capability};
use biblio_core::domain::{BibliographyDraft, BibliographyRecord, BibliographyUpdate};
use biblio_core::query::{self, FilterField, SearchQuery, SortDirection, SortKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::http_error;
use crate::web::state::{AppState, CurrentUser};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One bibliography record as returned to clients.
#[derive(Serialize, ToSchema)]
pub struct BibliographyPayload {
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: String,
    pub publication: Option<String>,
    pub publisher: Option<String>,
    pub biblio_name: Option<String>,
    pub language_published: Option<String>,
    pub language_researched: Option<String>,
    pub country_of_research: Option<String>,
    pub keywords: Option<String>,
    pub isbn: Option<String>,
    pub issn: Option<String>,
    pub url: Option<String>,
    pub date_of_entry: Option<String>,
    pub language_family: Option<String>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<BibliographyRecord> for BibliographyPayload {
    fn from(record: BibliographyRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            author: record.author,
            year: record.year,
            publication: record.publication,
            publisher: record.publisher,
            biblio_name: record.biblio_name,
            language_published: record.language_published,
            language_researched: record.language_researched,
            country_of_research: record.country_of_research,
            keywords: record.keywords,
            isbn: record.isbn,
            issn: record.issn,
            url: record.url,
            date_of_entry: record.date_of_entry,
            language_family: record.language_family,
            source: record.source,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// The paginated search response envelope.
#[derive(Serialize, ToSchema)]
pub struct SearchResponse {
    pub records: Vec<BibliographyPayload>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

/// Query parameters accepted by the search and export endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
pub struct SearchParams {
    /// Free-text term, OR-matched across title/author/keywords/publication/biblio_name.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Field name to sort by; defaults to newest-first.
    pub sort_by: Option<String>,
    /// "asc" or "desc".
    pub sort_dir: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub publication: Option<String>,
    pub publisher: Option<String>,
    pub biblio_name: Option<String>,
    pub language_published: Option<String>,
    pub language_researched: Option<String>,
    pub country_of_research: Option<String>,
    pub keywords: Option<String>,
    pub isbn: Option<String>,
    pub issn: Option<String>,
    pub url: Option<String>,
    pub date_of_entry: Option<String>,
    pub language_family: Option<String>,
    pub source: Option<String>,
}

impl SearchParams {
    /// Collects the named field filters that were actually supplied.
    fn filters(&self) -> Vec<(FilterField, String)> {
        let pairs = [
            (FilterField::Title, &self.title),
            (FilterField::Author, &self.author),
            (FilterField::Year, &self.year),
            (FilterField::Publication, &self.publication),
            (FilterField::Publisher, &self.publisher),
            (FilterField::BiblioName, &self.biblio_name),
            (FilterField::LanguagePublished, &self.language_published),
            (FilterField::LanguageResearched, &self.language_researched),
            (FilterField::CountryOfResearch, &self.country_of_research),
            (FilterField::Keywords, &self.keywords),
            (FilterField::Isbn, &self.isbn),
            (FilterField::Issn, &self.issn),
            (FilterField::Url, &self.url),
            (FilterField::DateOfEntry, &self.date_of_entry),
            (FilterField::LanguageFamily, &self.language_family),
            (FilterField::Source, &self.source),
        ];
        pairs
            .into_iter()
            .filter_map(|(field, value)| value.clone().map(|v| (field, v)))
            .collect()
    }

    fn sort(&self) -> Option<(SortKey, SortDirection)> {
        let key = match self.sort_by.as_deref() {
            None | Some("") => return None,
            Some("id") => SortKey::Id,
            // Unknown sort fields fall back to the default ordering.
            Some(name) => SortKey::Field(FilterField::parse(name)?),
        };
        let direction = match self.sort_dir.as_deref() {
            Some("asc") => SortDirection::Ascending,
            _ => SortDirection::Descending,
        };
        Some((key, direction))
    }

    fn into_query(self) -> SearchQuery {
        let sort = self.sort();
        let filters = self.filters();
        SearchQuery {
            term: self.search,
            filters,
            page: self.page.unwrap_or(1),
            limit: self.limit,
            sort,
        }
    }
}

/// Fields accepted when creating a record.
#[derive(Deserialize, ToSchema)]
pub struct CreateBibliographyRequest {
    pub title: String,
    pub author: String,
    pub year: String,
    #[serde(default)]
    pub publication: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub biblio_name: Option<String>,
    #[serde(default)]
    pub language_published: Option<String>,
    #[serde(default)]
    pub language_researched: Option<String>,
    #[serde(default)]
    pub country_of_research: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub issn: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date_of_entry: Option<String>,
    #[serde(default)]
    pub language_family: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl CreateBibliographyRequest {
    fn into_draft(self) -> BibliographyDraft {
        BibliographyDraft {
            title: self.title,
            author: self.author,
            year: self.year,
            publication: self.publication,
            publisher: self.publisher,
            biblio_name: self.biblio_name,
            language_published: self.language_published,
            language_researched: self.language_researched,
            country_of_research: self.country_of_research,
            keywords: self.keywords,
            isbn: self.isbn,
            issn: self.issn,
            url: self.url,
            date_of_entry: self.date_of_entry,
            language_family: self.language_family,
            source: self.source,
        }
    }
}

/// Partial update: omitted fields keep their stored values.
#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateBibliographyRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub publication: Option<String>,
    pub publisher: Option<String>,
    pub biblio_name: Option<String>,
    pub language_published: Option<String>,
    pub language_researched: Option<String>,
    pub country_of_research: Option<String>,
    pub keywords: Option<String>,
    pub isbn: Option<String>,
    pub issn: Option<String>,
    pub url: Option<String>,
    pub date_of_entry: Option<String>,
    pub language_family: Option<String>,
    pub source: Option<String>,
}

impl UpdateBibliographyRequest {
    fn into_update(self) -> BibliographyUpdate {
        BibliographyUpdate {
            title: self.title,
            author: self.author,
            year: self.year,
            publication: self.publication,
            publisher: self.publisher,
            biblio_name: self.biblio_name,
            language_published: self.language_published,
            language_researched: self.language_researched,
            country_of_research: self.country_of_research,
            keywords: self.keywords,
            isbn: self.isbn,
            issn: self.issn,
            url: self.url,
            date_of_entry: self.date_of_entry,
            language_family: self.language_family,
            source: self.source,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /bibliographies - Search with free text, named filters, sort, and pagination.
#[utoipa::path(
    get,
    path = "/bibliographies",
    params(SearchParams),
    responses(
        (status = 200, description = "One page of matching records", body = SearchResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::View).map_err(http_error)?;

    let results = query::search(state.db.as_ref(), &params.into_query())
        .await
        .map_err(http_error)?;
    Ok(Json(SearchResponse {
        records: results.records.into_iter().map(Into::into).collect(),
        total: results.total,
        page: results.page,
        total_pages: results.total_pages,
    }))
}

/// GET /bibliographies/export - Export matching records as CSV.
///
/// Applies only the named field filters; the free-text term and pagination
/// are ignored for exports.
#[utoipa::path(
    get,
    path = "/bibliographies/export",
    params(SearchParams),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::View).map_err(http_error)?;

    let csv = query::export_csv(state.db.as_ref(), &params.filters())
        .await
        .map_err(http_error)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"bibliographies.csv\"",
            ),
        ],
        csv,
    ))
}

/// POST /bibliographies - Create a record.
#[utoipa::path(
    post,
    path = "/bibliographies",
    request_body = CreateBibliographyRequest,
    responses(
        (status = 201, description = "Record created", body = BibliographyPayload),
        (status = 400, description = "Missing title, author, or year"),
        (status = 403, description = "Role lacks the create capability")
    )
)]
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateBibliographyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::Create).map_err(http_error)?;

    let draft = req.into_draft();
    draft.validate().map_err(http_error)?;
    let record = draft.into_record();
    state
        .db
        .insert_bibliography(&record)
        .await
        .map_err(http_error)?;
    state
        .db
        .bump_bibliography_count(user.id)
        .await
        .map_err(http_error)?;
    state.dashboard_cache.invalidate(&crate::web::dashboard::STATS_KEY);

    info!(id = %record.id, "bibliography created");
    Ok((StatusCode::CREATED, Json(BibliographyPayload::from(record))))
}

/// PUT /bibliographies/{id} - Partially update a record.
#[utoipa::path(
    put,
    path = "/bibliographies/{id}",
    request_body = UpdateBibliographyRequest,
    params(("id" = String, Path, description = "Record identifier")),
    responses(
        (status = 200, description = "Record updated", body = BibliographyPayload),
        (status = 400, description = "A required field was blanked out"),
        (status = 403, description = "Role lacks the update capability"),
        (status = 404, description = "No such record")
    )
)]
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateBibliographyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::Update).map_err(http_error)?;

    let update = req.into_update();
    update.validate().map_err(http_error)?;
    let record = if update.is_empty() {
        // Nothing to write; hand back the stored record untouched.
        state.db.get_bibliography(&id).await.map_err(http_error)?
    } else {
        let record = state
            .db
            .update_bibliography(&id, &update)
            .await
            .map_err(http_error)?;
        // The dashboard's recent-records list may now be stale.
        state.dashboard_cache.invalidate(&crate::web::dashboard::STATS_KEY);
        record
    };
    Ok(Json(BibliographyPayload::from(record)))
}

/// DELETE /bibliographies/{id} - Remove a record.
#[utoipa::path(
    delete,
    path = "/bibliographies/{id}",
    params(("id" = String, Path, description = "Record identifier")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 403, description = "Role lacks the delete capability"),
        (status = 404, description = "No such record")
    )
)]
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require(user.role, Capability::Delete).map_err(http_error)?;

    state
        .db
        .delete_bibliography(&id)
        .await
        .map_err(http_error)?;
    state.dashboard_cache.invalidate(&crate::web::dashboard::STATS_KEY);
    info!(%id, "bibliography deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use biblio_core::domain::{NewUser, Role, UserAccount, UserCredentials, UserPreferences};
    use biblio_core::ports::{CoreResult, DatabaseService};
    use biblio_core::query::{Condition, QueryPlan};
    use std::time::Duration;
    use uuid::Uuid;

    use crate::cache::TtlCache;
    use crate::config::Config;
    use crate::web::dashboard::{DashboardStats, STATS_KEY};

    fn stored_record() -> BibliographyRecord {
        BibliographyRecord {
            id: "5f8f8c449d1e8b6a2c3d4e5f".to_string(),
            title: "Grammar of Ainu".to_string(),
            author: "Kirsten Refsing".to_string(),
            year: "1986".to_string(),
            created_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Store double serving the single stored record; only the methods the
    /// update handler reaches are implemented.
    struct SingleRecordDb;

    #[async_trait]
    impl DatabaseService for SingleRecordDb {
        async fn search_bibliographies(
            &self,
            _plan: &QueryPlan,
        ) -> CoreResult<(Vec<BibliographyRecord>, u64)> {
            unimplemented!()
        }

        async fn find_bibliographies(
            &self,
            _conditions: &[Condition],
        ) -> CoreResult<Vec<BibliographyRecord>> {
            unimplemented!()
        }

        async fn get_bibliography(&self, _id: &str) -> CoreResult<BibliographyRecord> {
            Ok(stored_record())
        }

        async fn insert_bibliography(&self, _record: &BibliographyRecord) -> CoreResult<()> {
            unimplemented!()
        }

        async fn update_bibliography(
            &self,
            _id: &str,
            update: &BibliographyUpdate,
        ) -> CoreResult<BibliographyRecord> {
            Ok(update.apply(&stored_record()))
        }

        async fn delete_bibliography(&self, _id: &str) -> CoreResult<()> {
            unimplemented!()
        }

        async fn count_bibliographies(&self) -> CoreResult<u64> {
            unimplemented!()
        }

        async fn create_user(&self, _new_user: &NewUser) -> CoreResult<UserAccount> {
            unimplemented!()
        }

        async fn get_user(&self, _user_id: Uuid) -> CoreResult<UserAccount> {
            unimplemented!()
        }

        async fn get_user_by_email(&self, _email: &str) -> CoreResult<UserCredentials> {
            unimplemented!()
        }

        async fn list_users(&self) -> CoreResult<Vec<UserAccount>> {
            unimplemented!()
        }

        async fn set_user_role(
            &self,
            _user_id: Uuid,
            _role: Role,
            _changed_by: Uuid,
        ) -> CoreResult<UserAccount> {
            unimplemented!()
        }

        async fn deactivate_user(&self, _user_id: Uuid) -> CoreResult<()> {
            unimplemented!()
        }

        async fn record_login(&self, _user_id: Uuid) -> CoreResult<()> {
            unimplemented!()
        }

        async fn bump_bibliography_count(&self, _user_id: Uuid) -> CoreResult<()> {
            unimplemented!()
        }

        async fn update_user_preferences(
            &self,
            _user_id: Uuid,
            _preferences: &UserPreferences,
        ) -> CoreResult<()> {
            unimplemented!()
        }

        async fn count_users(&self) -> CoreResult<u64> {
            unimplemented!()
        }

        async fn create_auth_session(
            &self,
            _session_id: &str,
            _user_id: Uuid,
            _expires_at: DateTime<Utc>,
        ) -> CoreResult<()> {
            unimplemented!()
        }

        async fn validate_auth_session(&self, _session_id: &str) -> CoreResult<Uuid> {
            unimplemented!()
        }

        async fn delete_auth_session(&self, _session_id: &str) -> CoreResult<()> {
            unimplemented!()
        }
    }

    fn test_state() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            cors_origin: "http://localhost:3000".to_string(),
            session_ttl_days: 30,
            dashboard_cache_ttl_secs: 60,
        };
        Arc::new(AppState {
            db: Arc::new(SingleRecordDb),
            config: Arc::new(config),
            dashboard_cache: TtlCache::new(Duration::from_secs(60)),
        })
    }

    fn cached_stats() -> DashboardStats {
        DashboardStats {
            total_bibliographies: 1,
            total_users: 1,
            recent: Vec::new(),
        }
    }

    #[tokio::test]
    async fn update_invalidates_dashboard_stats() {
        let state = test_state();
        state.dashboard_cache.put(STATS_KEY, cached_stats());

        let user = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let req = UpdateBibliographyRequest {
            title: Some("A Grammar of Ainu".to_string()),
            ..Default::default()
        };
        update_handler(
            State(state.clone()),
            Extension(user),
            Path("5f8f8c449d1e8b6a2c3d4e5f".to_string()),
            Json(req),
        )
        .await
        .unwrap();

        assert!(state.dashboard_cache.get(&STATS_KEY).is_none());
    }

    #[tokio::test]
    async fn empty_update_leaves_cached_stats_in_place() {
        let state = test_state();
        state.dashboard_cache.put(STATS_KEY, cached_stats());

        let user = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        update_handler(
            State(state.clone()),
            Extension(user),
            Path("5f8f8c449d1e8b6a2c3d4e5f".to_string()),
            Json(UpdateBibliographyRequest::default()),
        )
        .await
        .unwrap();

        // No write happened, so the cached figures are still accurate.
        assert!(state.dashboard_cache.get(&STATS_KEY).is_some());
    }

    #[tokio::test]
    async fn standard_role_cannot_update() {
        let state = test_state();
        let user = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Standard,
        };
        let result = update_handler(
            State(state),
            Extension(user),
            Path("5f8f8c449d1e8b6a2c3d4e5f".to_string()),
            Json(UpdateBibliographyRequest::default()),
        )
        .await;
        let (status, _) = result.err().unwrap();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
