//! services/api/src/adapters/db.rs
//!
//! The database adapter: the concrete implementation of the `DatabaseService`
//! port from the core crate, backed by PostgreSQL through `sqlx`. Search
//! filters arrive as compiled `Condition`s and are lowered to SQL with
//! `QueryBuilder`, since the filter set is only known at request time.

use async_trait::async_trait;
use biblio_core::domain::{
    BibliographyRecord, BibliographyUpdate, NewUser, NotificationPreferences, Role, UserAccount,
    UserCredentials, UserPreferences, UserStatistics,
};
use biblio_core::oid;
use biblio_core::ports::{CoreError, CoreResult, DatabaseService};
use biblio_core::query::{Condition, FilterField, QueryPlan, SortDirection, SortKey, TEXT_SEARCH_FIELDS};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Backfill helpers (administrative, not part of the port) ---

    /// One batch of record ids whose `created_at` has never been set,
    /// starting after the cursor so failed rows are not refetched forever.
    pub async fn ids_missing_created_at(
        &self,
        after: &str,
        limit: i64,
    ) -> CoreResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM bibliographies WHERE created_at IS NULL AND id > $1 \
             ORDER BY id LIMIT $2",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(retrieval)?;
        Ok(ids.into_iter().map(|id| id.trim().to_string()).collect())
    }

    /// Sets `created_at` for one record, only if it is still unset.
    pub async fn backfill_created_at(
        &self,
        id: &str,
        created_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query("UPDATE bibliographies SET created_at = $2 WHERE id = $1 AND created_at IS NULL")
            .bind(id)
            .bind(created_at)
            .execute(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(())
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn retrieval(error: sqlx::Error) -> CoreError {
    CoreError::Retrieval(error.to_string())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

//=========================================================================================
// SQL Lowering for Query Plans
//=========================================================================================

/// Column for a filterable field. Field names come from a closed enum, so
/// pushing them into SQL directly is safe.
fn column(field: FilterField) -> &'static str {
    match field {
        FilterField::Title => "title",
        FilterField::Author => "author",
        FilterField::Year => "year",
        FilterField::Publication => "publication",
        FilterField::Publisher => "publisher",
        FilterField::BiblioName => "biblio_name",
        FilterField::LanguagePublished => "language_published",
        FilterField::LanguageResearched => "language_researched",
        FilterField::CountryOfResearch => "country_of_research",
        FilterField::Keywords => "keywords",
        FilterField::Isbn => "isbn",
        FilterField::Issn => "issn",
        FilterField::Url => "url",
        FilterField::DateOfEntry => "date_of_entry",
        FilterField::LanguageFamily => "language_family",
        FilterField::Source => "source",
    }
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::Id => "id",
        SortKey::Field(field) => column(field),
    }
}

/// Escapes LIKE wildcards so a filter value is matched as a literal
/// substring, then wraps it in `%`.
fn like_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Appends `WHERE ...` for the plan's conditions. Conditions AND together;
/// the free-text condition ORs across its field set internally.
fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, conditions: &[Condition]) {
    if conditions.is_empty() {
        return;
    }
    builder.push(" WHERE ");
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            builder.push(" AND ");
        }
        match condition {
            Condition::Text(term) => {
                let pattern = like_pattern(term);
                builder.push("(");
                for (i, field) in TEXT_SEARCH_FIELDS.iter().enumerate() {
                    if i > 0 {
                        builder.push(" OR ");
                    }
                    builder.push(column(*field));
                    builder.push(" ILIKE ");
                    builder.push_bind(pattern.clone());
                }
                builder.push(")");
            }
            Condition::Contains(field, value) => {
                builder.push(column(*field));
                builder.push(" ILIKE ");
                builder.push_bind(like_pattern(value));
            }
            Condition::YearEquals(year) => {
                builder.push("btrim(year) = ");
                builder.push_bind(year.to_string());
            }
            Condition::YearBetween(start, end) => {
                // Non-numeric years (ranges, free text) never match a range
                // filter; guard the cast with a digits-only check.
                builder.push("(btrim(year) ~ '^[0-9]{1,9}$' AND btrim(year)::bigint BETWEEN ");
                builder.push_bind(*start);
                builder.push(" AND ");
                builder.push_bind(*end);
                builder.push(")");
            }
        }
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const BIBLIOGRAPHY_COLUMNS: &str = "id, title, author, year, publication, publisher, \
biblio_name, language_published, language_researched, country_of_research, keywords, \
isbn, issn, url, date_of_entry, language_family, source, created_at, updated_at";

#[derive(FromRow)]
struct BibliographyRow {
    id: String,
    title: String,
    author: String,
    year: String,
    publication: Option<String>,
    publisher: Option<String>,
    biblio_name: Option<String>,
    language_published: Option<String>,
    language_researched: Option<String>,
    country_of_research: Option<String>,
    keywords: Option<String>,
    isbn: Option<String>,
    issn: Option<String>,
    url: Option<String>,
    date_of_entry: Option<String>,
    language_family: Option<String>,
    source: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl BibliographyRow {
    fn to_domain(self) -> BibliographyRecord {
        // Rows written before the backfill ran carry no stored timestamp;
        // the id prefix is authoritative in that case.
        let created_at = self
            .created_at
            .unwrap_or_else(|| oid::extract_timestamp(self.id.trim()));
        BibliographyRecord {
            id: self.id.trim().to_string(),
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
            updated_at: self.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "user_id, email, name, role, is_active, language, timezone, \
notify_email, notify_browser, total_bibliographies, last_login, role_changed_by, \
role_changed_at, created_at";

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    name: String,
    role: String,
    is_active: bool,
    language: String,
    timezone: String,
    notify_email: bool,
    notify_browser: bool,
    total_bibliographies: i64,
    last_login: Option<DateTime<Utc>>,
    role_changed_by: Option<Uuid>,
    role_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn to_domain(self) -> UserAccount {
        UserAccount {
            id: self.user_id,
            email: self.email,
            name: self.name,
            role: parse_role(&self.role, self.user_id),
            is_active: self.is_active,
            preferences: UserPreferences {
                language: self.language,
                timezone: self.timezone,
                notifications: NotificationPreferences {
                    email: self.notify_email,
                    browser: self.notify_browser,
                },
            },
            statistics: UserStatistics {
                total_bibliographies: self.total_bibliographies,
                last_login: self.last_login,
                created_at: self.created_at,
            },
            role_changed_by: self.role_changed_by,
            role_changed_at: self.role_changed_at,
        }
    }
}

/// Unknown role strings degrade to the least-privileged role rather than
/// aborting; callers then reject anything the standard role cannot do.
fn parse_role(value: &str, user_id: Uuid) -> Role {
    Role::parse(value).unwrap_or_else(|| {
        warn!(%user_id, role = value, "unrecognized role, treating as standard");
        Role::Standard
    })
}

#[derive(FromRow)]
struct CredentialsRow {
    user_id: Uuid,
    email: String,
    hashed_password: String,
    role: String,
    is_active: bool,
}

impl CredentialsRow {
    fn to_domain(self) -> UserCredentials {
        let role = parse_role(&self.role, self.user_id);
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
            role,
            is_active: self.is_active,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn search_bibliographies(
        &self,
        plan: &QueryPlan,
    ) -> CoreResult<(Vec<BibliographyRecord>, u64)> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM bibliographies");
        push_conditions(&mut count_builder, &plan.conditions);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(retrieval)?;

        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM bibliographies",
            BIBLIOGRAPHY_COLUMNS
        ));
        push_conditions(&mut builder, &plan.conditions);
        builder.push(" ORDER BY ");
        builder.push(sort_column(plan.sort.0));
        builder.push(match plan.sort.1 {
            SortDirection::Ascending => " ASC",
            SortDirection::Descending => " DESC",
        });
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(plan.limit));
        builder.push(" OFFSET ");
        builder.push_bind(plan.skip as i64);

        let rows: Vec<BibliographyRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(retrieval)?;

        Ok((
            rows.into_iter().map(BibliographyRow::to_domain).collect(),
            total as u64,
        ))
    }

    async fn find_bibliographies(
        &self,
        conditions: &[Condition],
    ) -> CoreResult<Vec<BibliographyRecord>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {} FROM bibliographies",
            BIBLIOGRAPHY_COLUMNS
        ));
        push_conditions(&mut builder, conditions);
        builder.push(" ORDER BY id DESC");

        let rows: Vec<BibliographyRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(rows.into_iter().map(BibliographyRow::to_domain).collect())
    }

    async fn get_bibliography(&self, id: &str) -> CoreResult<BibliographyRecord> {
        let row: Option<BibliographyRow> = sqlx::query_as(&format!(
            "SELECT {} FROM bibliographies WHERE id = $1",
            BIBLIOGRAPHY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieval)?;

        row.map(BibliographyRow::to_domain)
            .ok_or_else(|| CoreError::NotFound(format!("bibliography {} not found", id)))
    }

    async fn insert_bibliography(&self, record: &BibliographyRecord) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO bibliographies (id, title, author, year, publication, publisher, \
             biblio_name, language_published, language_researched, country_of_research, \
             keywords, isbn, issn, url, date_of_entry, language_family, source, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.author)
        .bind(&record.year)
        .bind(&record.publication)
        .bind(&record.publisher)
        .bind(&record.biblio_name)
        .bind(&record.language_published)
        .bind(&record.language_researched)
        .bind(&record.country_of_research)
        .bind(&record.keywords)
        .bind(&record.isbn)
        .bind(&record.issn)
        .bind(&record.url)
        .bind(&record.date_of_entry)
        .bind(&record.language_family)
        .bind(&record.source)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(retrieval)?;
        Ok(())
    }

    async fn update_bibliography(
        &self,
        id: &str,
        update: &BibliographyUpdate,
    ) -> CoreResult<BibliographyRecord> {
        let mut builder = QueryBuilder::new("UPDATE bibliographies SET ");
        let mut fields = builder.separated(", ");

        macro_rules! set_field {
            ($field:ident) => {
                if let Some(value) = &update.$field {
                    fields.push(concat!(stringify!($field), " = "));
                    fields.push_bind_unseparated(value);
                }
            };
        }
        set_field!(title);
        set_field!(author);
        set_field!(year);
        set_field!(publication);
        set_field!(publisher);
        set_field!(biblio_name);
        set_field!(language_published);
        set_field!(language_researched);
        set_field!(country_of_research);
        set_field!(keywords);
        set_field!(isbn);
        set_field!(issn);
        set_field!(url);
        set_field!(date_of_entry);
        set_field!(language_family);
        set_field!(source);
        fields.push("updated_at = NOW()");

        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.push(format!(" RETURNING {}", BIBLIOGRAPHY_COLUMNS));

        let row: Option<BibliographyRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(retrieval)?;

        row.map(BibliographyRow::to_domain)
            .ok_or_else(|| CoreError::NotFound(format!("bibliography {} not found", id)))
    }

    async fn delete_bibliography(&self, id: &str) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM bibliographies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(retrieval)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("bibliography {} not found", id)));
        }
        Ok(())
    }

    async fn count_bibliographies(&self) -> CoreResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bibliographies")
            .fetch_one(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(total as u64)
    }

    async fn create_user(&self, new_user: &NewUser) -> CoreResult<UserAccount> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (user_id, email, name, hashed_password, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new_user.email.trim().to_lowercase())
        .bind(&new_user.name)
        .bind(&new_user.hashed_password)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("email '{}' is already registered", new_user.email))
            } else {
                retrieval(e)
            }
        })?;
        Ok(row.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> CoreResult<UserAccount> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(retrieval)?;
        row.map(UserRow::to_domain)
            .ok_or_else(|| CoreError::NotFound(format!("user {} not found", user_id)))
    }

    async fn get_user_by_email(&self, email: &str) -> CoreResult<UserCredentials> {
        let row: Option<CredentialsRow> = sqlx::query_as(
            "SELECT user_id, email, hashed_password, role, is_active \
             FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieval)?;
        row.map(CredentialsRow::to_domain)
            .ok_or_else(|| CoreError::NotFound(format!("no account for '{}'", email)))
    }

    async fn list_users(&self) -> CoreResult<Vec<UserAccount>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(retrieval)?;
        Ok(rows.into_iter().map(UserRow::to_domain).collect())
    }

    async fn set_user_role(
        &self,
        user_id: Uuid,
        role: Role,
        changed_by: Uuid,
    ) -> CoreResult<UserAccount> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET role = $2, role_changed_by = $3, role_changed_at = NOW() \
             WHERE user_id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(role.as_str())
        .bind(changed_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieval)?;
        row.map(UserRow::to_domain)
            .ok_or_else(|| CoreError::NotFound(format!("user {} not found", user_id)))
    }

    async fn deactivate_user(&self, user_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(retrieval)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("user {} not found", user_id)));
        }
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(())
    }

    async fn bump_bibliography_count(&self, user_id: Uuid) -> CoreResult<()> {
        sqlx::query(
            "UPDATE users SET total_bibliographies = total_bibliographies + 1 WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(retrieval)?;
        Ok(())
    }

    async fn update_user_preferences(
        &self,
        user_id: Uuid,
        preferences: &UserPreferences,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET language = $2, timezone = $3, notify_email = $4, \
             notify_browser = $5 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(&preferences.language)
        .bind(&preferences.timezone)
        .bind(preferences.notifications.email)
        .bind(preferences.notifications.browser)
        .execute(&self.pool)
        .await
        .map_err(retrieval)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("user {} not found", user_id)));
        }
        Ok(())
    }

    async fn count_users(&self) -> CoreResult<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(total as u64)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> CoreResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(retrieval)?;
        user_id.ok_or_else(|| CoreError::NotFound("session expired or unknown".to_string()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(retrieval)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_escape_wildcards() {
        assert_eq!(like_pattern("ainu"), "%ainu%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
    }

    #[test]
    fn conditions_lower_to_sql() {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM bibliographies");
        push_conditions(
            &mut builder,
            &[
                Condition::Text("ainu".to_string()),
                Condition::Contains(FilterField::Publisher, "brill".to_string()),
                Condition::YearBetween(2018, 2020),
            ],
        );
        let sql = builder.sql();
        assert!(sql.contains("WHERE (title ILIKE "));
        assert!(sql.contains(" OR biblio_name ILIKE "));
        assert!(sql.contains(" AND publisher ILIKE "));
        assert!(sql.contains("btrim(year) ~ '^[0-9]{1,9}$'"));
    }

    #[test]
    fn empty_condition_list_adds_no_where_clause() {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM bibliographies");
        push_conditions(&mut builder, &[]);
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM bibliographies");
    }
}
