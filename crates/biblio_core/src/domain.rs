//! crates/biblio_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::oid;
use crate::ports::{CoreError, CoreResult};
use crate::query::FilterField;

//=========================================================================================
// Bibliography Records
//=========================================================================================

/// One catalogued publication entry with descriptive metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BibliographyRecord {
    /// 24-hex-character identifier whose leading 8 characters encode the
    /// creation time in Unix seconds. Lexicographic order follows creation order.
    pub id: String,
    pub title: String,
    pub author: String,
    /// Free text, not strictly numeric. May hold ranges such as "1998-2001".
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
    /// Set once at creation, immutable thereafter.
    pub created_at: DateTime<Utc>,
    /// None until the first edit, then refreshed on every mutation.
    pub updated_at: Option<DateTime<Utc>>,
}

impl BibliographyRecord {
    /// Reads the value of one filterable/exportable field.
    ///
    /// This accessor is the single source of truth for the field set shared
    /// by CSV export and in-memory condition matching.
    pub fn field(&self, field: FilterField) -> Option<&str> {
        match field {
            FilterField::Title => Some(self.title.as_str()),
            FilterField::Author => Some(self.author.as_str()),
            FilterField::Year => Some(self.year.as_str()),
            FilterField::Publication => self.publication.as_deref(),
            FilterField::Publisher => self.publisher.as_deref(),
            FilterField::BiblioName => self.biblio_name.as_deref(),
            FilterField::LanguagePublished => self.language_published.as_deref(),
            FilterField::LanguageResearched => self.language_researched.as_deref(),
            FilterField::CountryOfResearch => self.country_of_research.as_deref(),
            FilterField::Keywords => self.keywords.as_deref(),
            FilterField::Isbn => self.isbn.as_deref(),
            FilterField::Issn => self.issn.as_deref(),
            FilterField::Url => self.url.as_deref(),
            FilterField::DateOfEntry => self.date_of_entry.as_deref(),
            FilterField::LanguageFamily => self.language_family.as_deref(),
            FilterField::Source => self.source.as_deref(),
        }
    }
}

/// Input for creating a new bibliography record.
#[derive(Debug, Clone, Default)]
pub struct BibliographyDraft {
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
}

impl BibliographyDraft {
    /// Checks the creation invariants: `title` and `author` non-empty,
    /// `year` present.
    pub fn validate(&self) -> CoreResult<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation { field: "title" });
        }
        if self.author.trim().is_empty() {
            return Err(CoreError::Validation { field: "author" });
        }
        if self.year.trim().is_empty() {
            return Err(CoreError::Validation { field: "year" });
        }
        Ok(())
    }

    /// Mints the identifier and turns the draft into a full record.
    ///
    /// `created_at` is derived from the new identifier so the stored
    /// timestamp and the id-encoded timestamp can never disagree.
    pub fn into_record(self) -> BibliographyRecord {
        let id = oid::generate();
        let created_at = oid::extract_timestamp(&id);
        BibliographyRecord {
            id,
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
            created_at,
            updated_at: None,
        }
    }
}

/// A partial update to an existing record. Fields left as `None` keep their
/// stored value; fields set to `Some` replace it. Applying the same update
/// twice yields the same field values (only `updated_at` moves).
#[derive(Debug, Clone, Default)]
pub struct BibliographyUpdate {
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

impl BibliographyUpdate {
    /// A supplied `title` or `author` may not be blanked out; `year` may not
    /// be emptied either once present.
    pub fn validate(&self) -> CoreResult<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(CoreError::Validation { field: "title" });
        }
        if matches!(&self.author, Some(a) if a.trim().is_empty()) {
            return Err(CoreError::Validation { field: "author" });
        }
        if matches!(&self.year, Some(y) if y.trim().is_empty()) {
            return Err(CoreError::Validation { field: "year" });
        }
        Ok(())
    }

    /// Applies the partial replacement in memory, mirroring what the
    /// adapter's UPDATE writes: supplied fields replace stored values,
    /// omitted fields stay, and `updated_at` is refreshed. Idempotent on
    /// everything but `updated_at`.
    pub fn apply(&self, record: &BibliographyRecord) -> BibliographyRecord {
        let mut updated = record.clone();
        if let Some(title) = &self.title {
            updated.title = title.clone();
        }
        if let Some(author) = &self.author {
            updated.author = author.clone();
        }
        if let Some(year) = &self.year {
            updated.year = year.clone();
        }
        if let Some(publication) = &self.publication {
            updated.publication = Some(publication.clone());
        }
        if let Some(publisher) = &self.publisher {
            updated.publisher = Some(publisher.clone());
        }
        if let Some(biblio_name) = &self.biblio_name {
            updated.biblio_name = Some(biblio_name.clone());
        }
        if let Some(language_published) = &self.language_published {
            updated.language_published = Some(language_published.clone());
        }
        if let Some(language_researched) = &self.language_researched {
            updated.language_researched = Some(language_researched.clone());
        }
        if let Some(country_of_research) = &self.country_of_research {
            updated.country_of_research = Some(country_of_research.clone());
        }
        if let Some(keywords) = &self.keywords {
            updated.keywords = Some(keywords.clone());
        }
        if let Some(isbn) = &self.isbn {
            updated.isbn = Some(isbn.clone());
        }
        if let Some(issn) = &self.issn {
            updated.issn = Some(issn.clone());
        }
        if let Some(url) = &self.url {
            updated.url = Some(url.clone());
        }
        if let Some(date_of_entry) = &self.date_of_entry {
            updated.date_of_entry = Some(date_of_entry.clone());
        }
        if let Some(language_family) = &self.language_family {
            updated.language_family = Some(language_family.clone());
        }
        if let Some(source) = &self.source {
            updated.source = Some(source.clone());
        }
        updated.updated_at = Some(Utc::now());
        updated
    }

    /// True when no field is set; useful for short-circuiting no-op updates.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.year.is_none()
            && self.publication.is_none()
            && self.publisher.is_none()
            && self.biblio_name.is_none()
            && self.language_published.is_none()
            && self.language_researched.is_none()
            && self.country_of_research.is_none()
            && self.keywords.is_none()
            && self.isbn.is_none()
            && self.issn.is_none()
            && self.url.is_none()
            && self.date_of_entry.is_none()
            && self.language_family.is_none()
            && self.source.is_none()
    }
}

//=========================================================================================
// User Accounts
//=========================================================================================

/// An application principal. Never carries password material.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: Uuid,
    /// Stored lowercased; uniqueness is case-insensitive.
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub preferences: UserPreferences,
    pub statistics: UserStatistics,
    pub role_changed_by: Option<Uuid>,
    pub role_changed_at: Option<DateTime<Utc>>,
}

/// Only used internally for login - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub role: Role,
    pub is_active: bool,
}

/// Input for creating an account, either via signup or administratively.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub hashed_password: String,
    pub role: Role,
}

impl NewUser {
    pub fn validate(email: &str, name: &str, password: &str) -> CoreResult<()> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(CoreError::Validation { field: "email" });
        }
        if name.trim().is_empty() {
            return Err(CoreError::Validation { field: "name" });
        }
        if password.is_empty() {
            return Err(CoreError::Validation { field: "password" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferences {
    pub language: String,
    pub timezone: String,
    pub notifications: NotificationPreferences,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            timezone: "UTC".to_string(),
            notifications: NotificationPreferences::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPreferences {
    pub email: bool,
    pub browser: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            browser: false,
        }
    }
}

/// Aggregate counters kept per account.
#[derive(Debug, Clone)]
pub struct UserStatistics {
    pub total_bibliographies: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Roles
//=========================================================================================

/// The closed set of application roles. Keeping this an enum (rather than a
/// free-form string) makes the permission table total by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Standard,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Parses the stored role string. Returns `None` for anything outside
    /// the closed set; callers must treat that as `Standard` (least
    /// privilege), never as a silent abort.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "standard" => Some(Role::Standard),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

//=========================================================================================
// Auth Sessions
//=========================================================================================

/// A browser login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> BibliographyDraft {
        BibliographyDraft {
            title: "Grammar of Ainu".to_string(),
            author: "Kirsten Refsing".to_string(),
            year: "1986".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn draft_requires_title_author_year() {
        assert!(draft().validate().is_ok());

        let mut missing_title = draft();
        missing_title.title = "   ".to_string();
        assert!(matches!(
            missing_title.validate(),
            Err(CoreError::Validation { field: "title" })
        ));

        let mut missing_author = draft();
        missing_author.author = String::new();
        assert!(matches!(
            missing_author.validate(),
            Err(CoreError::Validation { field: "author" })
        ));

        let mut missing_year = draft();
        missing_year.year = String::new();
        assert!(matches!(
            missing_year.validate(),
            Err(CoreError::Validation { field: "year" })
        ));
    }

    #[test]
    fn into_record_mints_timestamp_ordered_id() {
        let record = draft().into_record();
        assert_eq!(record.id.len(), 24);
        assert!(record.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(record.updated_at.is_none());
        // created_at round-trips through the id prefix.
        assert_eq!(crate::oid::extract_timestamp(&record.id), record.created_at);
    }

    #[test]
    fn update_rejects_blanked_required_fields() {
        let update = BibliographyUpdate {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update.validate(),
            Err(CoreError::Validation { field: "title" })
        ));

        let update = BibliographyUpdate {
            keywords: Some(String::new()),
            ..Default::default()
        };
        // Optional descriptive fields may be cleared.
        assert!(update.validate().is_ok());
        assert!(!update.is_empty());
        assert!(BibliographyUpdate::default().is_empty());
    }

    #[test]
    fn applying_the_same_update_twice_changes_nothing() {
        let record = draft().into_record();
        let update = BibliographyUpdate {
            title: Some("A Grammar of Ainu".to_string()),
            keywords: Some("ainu, grammar".to_string()),
            publisher: Some("Aarhus University Press".to_string()),
            ..Default::default()
        };

        let once = update.apply(&record);
        let twice = update.apply(&once);

        assert_eq!(once.title, "A Grammar of Ainu");
        assert_eq!(once.author, record.author);
        assert_eq!(once.keywords.as_deref(), Some("ainu, grammar"));
        assert!(once.updated_at.is_some());

        // Only the refresh timestamp may differ between applications.
        let mut normalized = twice.clone();
        normalized.updated_at = once.updated_at;
        assert_eq!(once, normalized);
    }

    #[test]
    fn role_parsing_is_closed() {
        assert_eq!(Role::parse("standard"), Some(Role::Standard));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("super_admin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::Admin.as_str(), "admin");
    }
}
