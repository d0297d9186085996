//! crates/biblio_core/src/ports.rs
//!
//! Defines the persistence contract (trait) for the application's core
//! logic, plus the shared error taxonomy. The trait forms the boundary of
//! the hexagonal architecture, keeping the core independent of the concrete
//! database driver.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    BibliographyRecord, BibliographyUpdate, NewUser, Role, UserAccount, UserCredentials,
    UserPreferences,
};
use crate::query::{Condition, QueryPlan};

//=========================================================================================
// Error Taxonomy
//=========================================================================================

/// The distinct, inspectable error kinds raised by core operations.
/// The calling layer maps these to response codes; the core's contract is
/// only to make the kind unambiguous.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A required field is missing or empty at create/update time.
    #[error("validation failed: field '{field}' is required")]
    Validation { field: &'static str },

    /// The acting role lacks the required capability, or a self-referential
    /// forbidden action was attempted.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The target identifier does not resolve to an existing entity.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate email at account creation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The underlying persistence call failed. Not retried by the core.
    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

//=========================================================================================
// Persistence Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Bibliography Records ---

    /// Runs a compiled query plan and returns one page of records together
    /// with the total match count (ignoring pagination).
    async fn search_bibliographies(
        &self,
        plan: &QueryPlan,
    ) -> CoreResult<(Vec<BibliographyRecord>, u64)>;

    /// Returns every record matching the conditions, newest first. Used by
    /// CSV export, which applies no pagination.
    async fn find_bibliographies(
        &self,
        conditions: &[Condition],
    ) -> CoreResult<Vec<BibliographyRecord>>;

    async fn get_bibliography(&self, id: &str) -> CoreResult<BibliographyRecord>;

    async fn insert_bibliography(&self, record: &BibliographyRecord) -> CoreResult<()>;

    /// Partial field replacement; refreshes `updated_at` and returns the
    /// record as stored after the write.
    async fn update_bibliography(
        &self,
        id: &str,
        update: &BibliographyUpdate,
    ) -> CoreResult<BibliographyRecord>;

    async fn delete_bibliography(&self, id: &str) -> CoreResult<()>;

    async fn count_bibliographies(&self) -> CoreResult<u64>;

    // --- User Accounts ---

    async fn create_user(&self, new_user: &NewUser) -> CoreResult<UserAccount>;

    async fn get_user(&self, user_id: Uuid) -> CoreResult<UserAccount>;

    async fn get_user_by_email(&self, email: &str) -> CoreResult<UserCredentials>;

    async fn list_users(&self) -> CoreResult<Vec<UserAccount>>;

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role: Role,
        changed_by: Uuid,
    ) -> CoreResult<UserAccount>;

    /// Soft delete: flips `is_active` off. Accounts are never physically
    /// removed.
    async fn deactivate_user(&self, user_id: Uuid) -> CoreResult<()>;

    async fn record_login(&self, user_id: Uuid) -> CoreResult<()>;

    async fn bump_bibliography_count(&self, user_id: Uuid) -> CoreResult<()>;

    async fn update_user_preferences(
        &self,
        user_id: Uuid,
        preferences: &UserPreferences,
    ) -> CoreResult<()>;

    async fn count_users(&self) -> CoreResult<u64>;

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Resolves a session id to its user, rejecting expired sessions.
    async fn validate_auth_session(&self, session_id: &str) -> CoreResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> CoreResult<()>;
}
