//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, plus the
//! mapping from core error kinds to HTTP responses.

use axum::http::StatusCode;
use biblio_core::CoreError;

use crate::config::ConfigError;

/// The primary error type for the `api` service binaries.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error that propagated up from the core.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// An error from the underlying database library.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failure at startup.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps a core error to the HTTP response handlers return.
///
/// Authorization failures are surfaced distinctly from validation failures
/// so the client can render "access denied" rather than "bad input".
pub fn http_error(error: CoreError) -> (StatusCode, String) {
    let status = match &error {
        CoreError::Validation { .. } => StatusCode::BAD_REQUEST,
        CoreError::Authorization(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::Retrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_distinct_statuses() {
        let cases = [
            (CoreError::Validation { field: "title" }, StatusCode::BAD_REQUEST),
            (CoreError::Authorization("no".into()), StatusCode::FORBIDDEN),
            (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CoreError::Conflict("dup".into()), StatusCode::CONFLICT),
            (CoreError::Retrieval("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(http_error(error).0, expected);
        }
    }
}
