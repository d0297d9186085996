pub mod auth;
pub mod bibliography;
pub mod dashboard;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod users;

pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::{AppState, CurrentUser};
