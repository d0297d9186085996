pub mod access;
pub mod csv;
pub mod domain;
pub mod oid;
pub mod ports;
pub mod query;

pub use access::{ensure_not_self, ensure_role_change_allowed, require, Capability, Permissions};
pub use domain::{
    BibliographyDraft, BibliographyRecord, BibliographyUpdate, NewUser, Role, UserAccount,
    UserCredentials, UserPreferences, UserStatistics,
};
pub use ports::{CoreError, CoreResult, DatabaseService};
pub use query::{FilterField, SearchQuery, SearchResults, SortDirection, SortKey};
