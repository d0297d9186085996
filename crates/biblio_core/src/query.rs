//! crates/biblio_core/src/query.rs
//!
//! The bibliography query engine: compiles a `SearchQuery` into a
//! persistence-layer plan, runs it, and shapes the result page. Also drives
//! the unpaginated CSV export.
//!
//! Semantics: the free-text term OR's a case-insensitive substring match
//! across a fixed field set; every named field filter AND's with the rest.
//! Malformed filter values are dropped, never rejected, so a search degrades
//! gracefully instead of failing over one bad filter.

use crate::csv;
use crate::domain::BibliographyRecord;
use crate::ports::{CoreResult, DatabaseService};

/// Page size applied when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

//=========================================================================================
// Filterable Fields
//=========================================================================================

/// The closed set of fields a named filter (or the CSV export) can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Title,
    Author,
    Year,
    Publication,
    Publisher,
    BiblioName,
    LanguagePublished,
    LanguageResearched,
    CountryOfResearch,
    Keywords,
    Isbn,
    Issn,
    Url,
    DateOfEntry,
    LanguageFamily,
    Source,
}

/// Fields the free-text term is matched against (OR semantics).
pub const TEXT_SEARCH_FIELDS: [FilterField; 5] = [
    FilterField::Title,
    FilterField::Author,
    FilterField::Keywords,
    FilterField::Publication,
    FilterField::BiblioName,
];

impl FilterField {
    /// Parses the snake_case name used in query strings and sort parameters.
    pub fn parse(name: &str) -> Option<FilterField> {
        match name {
            "title" => Some(FilterField::Title),
            "author" => Some(FilterField::Author),
            "year" => Some(FilterField::Year),
            "publication" => Some(FilterField::Publication),
            "publisher" => Some(FilterField::Publisher),
            "biblio_name" => Some(FilterField::BiblioName),
            "language_published" => Some(FilterField::LanguagePublished),
            "language_researched" => Some(FilterField::LanguageResearched),
            "country_of_research" => Some(FilterField::CountryOfResearch),
            "keywords" => Some(FilterField::Keywords),
            "isbn" => Some(FilterField::Isbn),
            "issn" => Some(FilterField::Issn),
            "url" => Some(FilterField::Url),
            "date_of_entry" => Some(FilterField::DateOfEntry),
            "language_family" => Some(FilterField::LanguageFamily),
            "source" => Some(FilterField::Source),
            _ => None,
        }
    }
}

//=========================================================================================
// Queries and Plans
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// What the result set is ordered by. `Id` is the default: identifiers are
/// timestamp-ordered, so descending id order is most-recently-created-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Field(FilterField),
}

/// An ephemeral search request: free-text term, named field filters,
/// 1-based page, page size, and sort.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub term: Option<String>,
    pub filters: Vec<(FilterField, String)>,
    /// 1-based; values below 1 are clamped to 1.
    pub page: u32,
    pub limit: Option<u32>,
    pub sort: Option<(SortKey, SortDirection)>,
}

/// One atomic predicate of a compiled plan. All conditions AND together.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring match, OR'd across `TEXT_SEARCH_FIELDS`.
    Text(String),
    /// Case-insensitive substring match on one field.
    Contains(FilterField, String),
    /// Stored year equals this integer exactly (after trimming).
    YearEquals(i64),
    /// Stored year is numeric and within this inclusive range.
    YearBetween(i64, i64),
}

impl Condition {
    /// Reference semantics for a condition, matching what the SQL
    /// translation produces. Shared by tests and in-memory evaluation.
    pub fn matches(&self, record: &BibliographyRecord) -> bool {
        match self {
            Condition::Text(term) => TEXT_SEARCH_FIELDS
                .iter()
                .any(|field| contains_ignore_case(record.field(*field), term)),
            Condition::Contains(field, value) => {
                contains_ignore_case(record.field(*field), value)
            }
            Condition::YearEquals(year) => record.year.trim() == year.to_string(),
            Condition::YearBetween(start, end) => record
                .year
                .trim()
                .parse::<i64>()
                .map(|year| year >= *start && year <= *end)
                .unwrap_or(false),
        }
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    match haystack {
        Some(value) => value.to_lowercase().contains(&needle.to_lowercase()),
        None => false,
    }
}

/// A `SearchQuery` lowered to what the persistence layer executes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub conditions: Vec<Condition>,
    pub sort: (SortKey, SortDirection),
    pub skip: u64,
    pub limit: u32,
}

//=========================================================================================
// Compilation
//=========================================================================================

/// Lowers a search query to a plan. Empty inputs and unparsable year
/// filters are dropped here, so the plan only carries live predicates.
pub fn compile(query: &SearchQuery) -> QueryPlan {
    let mut conditions = Vec::new();

    if let Some(term) = &query.term {
        let term = term.trim();
        if !term.is_empty() {
            conditions.push(Condition::Text(term.to_string()));
        }
    }

    for (field, value) in &query.filters {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if *field == FilterField::Year {
            if let Some(condition) = parse_year_filter(value) {
                conditions.push(condition);
            }
        } else {
            conditions.push(Condition::Contains(*field, value.to_string()));
        }
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let page = query.page.max(1);
    QueryPlan {
        conditions,
        sort: query
            .sort
            .unwrap_or((SortKey::Id, SortDirection::Descending)),
        skip: u64::from(page - 1) * u64::from(limit),
        limit,
    }
}

/// Parses a year filter value: "A-B" becomes an inclusive range when both
/// halves parse and A <= B; a single integer becomes an exact match; anything
/// else yields `None` and the filter is dropped.
pub fn parse_year_filter(value: &str) -> Option<Condition> {
    if value.contains('-') {
        if let Some((start, end)) = value.split_once('-') {
            if let (Ok(start), Ok(end)) =
                (start.trim().parse::<i64>(), end.trim().parse::<i64>())
            {
                if start <= end {
                    return Some(Condition::YearBetween(start, end));
                }
            }
        }
    }
    value.parse::<i64>().ok().map(Condition::YearEquals)
}

/// `ceil(total / limit)`; a zero limit yields zero pages.
pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(u64::from(limit)) as u32
}

//=========================================================================================
// Engine Operations
//=========================================================================================

/// One page of search results plus the pagination envelope.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub records: Vec<BibliographyRecord>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

/// Runs a search: compile, execute, shape. Pages past the end come back
/// empty rather than failing.
pub async fn search(
    db: &dyn DatabaseService,
    query: &SearchQuery,
) -> CoreResult<SearchResults> {
    let plan = compile(query);
    let (records, total) = db.search_bibliographies(&plan).await?;
    Ok(SearchResults {
        records,
        total,
        page: query.page.max(1),
        total_pages: total_pages(total, plan.limit),
    })
}

/// Serializes every record matching the named filters to CSV. Unlike
/// `search`, every filter here is a plain substring match (the year filter
/// included) and no pagination applies.
pub async fn export_csv(
    db: &dyn DatabaseService,
    filters: &[(FilterField, String)],
) -> CoreResult<String> {
    let conditions: Vec<Condition> = filters
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(field, value)| Condition::Contains(*field, value.trim().to_string()))
        .collect();
    let records = db.find_bibliographies(&conditions).await?;
    Ok(csv::serialize(&records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BibliographyUpdate, NewUser, Role, UserAccount, UserCredentials, UserPreferences,
    };
    use crate::ports::{CoreError, CoreResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    fn record(title: &str, author: &str, year: &str, keywords: Option<&str>) -> BibliographyRecord {
        BibliographyRecord {
            id: crate::oid::generate(),
            title: title.to_string(),
            author: author.to_string(),
            year: year.to_string(),
            keywords: keywords.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn free_text_matches_keywords_only() {
        let entry = record("Grammar of Ainu", "Refsing", "1986", Some("phonology, syntax"));
        assert!(Condition::Text("syntax".to_string()).matches(&entry));
        assert!(Condition::Text("SYNTAX".to_string()).matches(&entry));
        assert!(!Condition::Text("morphology".to_string()).matches(&entry));
    }

    #[test]
    fn filters_and_together_text_ors_within() {
        let entry = record("Grammar of Ainu", "Refsing", "1986", Some("phonology"));
        let query = SearchQuery {
            term: Some("phonology".to_string()),
            filters: vec![(FilterField::Author, "Tamura".to_string())],
            page: 1,
            ..Default::default()
        };
        let plan = compile(&query);
        assert_eq!(plan.conditions.len(), 2);
        // The text term alone matches, but the non-matching author filter
        // excludes the record under AND semantics.
        assert!(plan.conditions[0].matches(&entry));
        assert!(!plan.conditions.iter().all(|c| c.matches(&entry)));
    }

    #[test]
    fn year_range_parsing() {
        assert_eq!(
            parse_year_filter("2018-2020"),
            Some(Condition::YearBetween(2018, 2020))
        );
        assert_eq!(parse_year_filter("2019"), Some(Condition::YearEquals(2019)));
        assert_eq!(parse_year_filter("not-a-year"), None);
        // Inverted ranges are not a range, and not a single integer either.
        assert_eq!(parse_year_filter("2020-2018"), None);

        let range = Condition::YearBetween(2018, 2020);
        for (year, expected) in [("2017", false), ("2018", true), ("2019", true), ("2020", true), ("2021", false)] {
            assert_eq!(range.matches(&record("t", "a", year, None)), expected, "{year}");
        }
        assert!(!range.matches(&record("t", "a", "circa 1900", None)));

        let exact = Condition::YearEquals(2019);
        assert!(exact.matches(&record("t", "a", " 2019 ", None)));
        assert!(!exact.matches(&record("t", "a", "2018", None)));
    }

    #[test]
    fn malformed_year_filter_is_dropped() {
        let query = SearchQuery {
            filters: vec![(FilterField::Year, "not-a-year".to_string())],
            page: 1,
            ..Default::default()
        };
        assert!(compile(&query).conditions.is_empty());
    }

    #[test]
    fn empty_inputs_are_dropped() {
        let query = SearchQuery {
            term: Some("   ".to_string()),
            filters: vec![
                (FilterField::Author, String::new()),
                (FilterField::Title, "  grammar ".to_string()),
            ],
            page: 1,
            ..Default::default()
        };
        let plan = compile(&query);
        assert_eq!(
            plan.conditions,
            vec![Condition::Contains(FilterField::Title, "grammar".to_string())]
        );
    }

    #[test]
    fn pagination_arithmetic() {
        assert_eq!(total_pages(45, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);

        let query = SearchQuery {
            page: 3,
            limit: Some(20),
            ..Default::default()
        };
        assert_eq!(compile(&query).skip, 40);

        // Page 0 and page 1 are the same page.
        let query = SearchQuery { page: 0, ..Default::default() };
        let plan = compile(&query);
        assert_eq!(plan.skip, 0);
        assert_eq!(plan.limit, DEFAULT_PAGE_SIZE);
    }

    //-------------------------------------------------------------------------------------
    // Engine tests against an in-memory store
    //-------------------------------------------------------------------------------------

    /// A store over a fixed record set, evaluating plans with
    /// `Condition::matches`. Only the read paths the engine uses are live.
    struct MemoryDb {
        records: Vec<BibliographyRecord>,
    }

    #[async_trait]
    impl crate::ports::DatabaseService for MemoryDb {
        async fn search_bibliographies(
            &self,
            plan: &QueryPlan,
        ) -> CoreResult<(Vec<BibliographyRecord>, u64)> {
            let mut matching: Vec<BibliographyRecord> = self
                .records
                .iter()
                .filter(|r| plan.conditions.iter().all(|c| c.matches(r)))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.id.cmp(&a.id));
            let total = matching.len() as u64;
            let page = matching
                .into_iter()
                .skip(plan.skip as usize)
                .take(plan.limit as usize)
                .collect();
            Ok((page, total))
        }

        async fn find_bibliographies(
            &self,
            conditions: &[Condition],
        ) -> CoreResult<Vec<BibliographyRecord>> {
            Ok(self
                .records
                .iter()
                .filter(|r| conditions.iter().all(|c| c.matches(r)))
                .cloned()
                .collect())
        }

        async fn get_bibliography(&self, id: &str) -> CoreResult<BibliographyRecord> {
            self.records
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .ok_or_else(|| CoreError::NotFound(id.to_string()))
        }

        async fn insert_bibliography(&self, _: &BibliographyRecord) -> CoreResult<()> {
            unimplemented!()
        }
        async fn update_bibliography(
            &self,
            _: &str,
            _: &BibliographyUpdate,
        ) -> CoreResult<BibliographyRecord> {
            unimplemented!()
        }
        async fn delete_bibliography(&self, _: &str) -> CoreResult<()> {
            unimplemented!()
        }
        async fn count_bibliographies(&self) -> CoreResult<u64> {
            Ok(self.records.len() as u64)
        }
        async fn create_user(&self, _: &NewUser) -> CoreResult<UserAccount> {
            unimplemented!()
        }
        async fn get_user(&self, _: Uuid) -> CoreResult<UserAccount> {
            unimplemented!()
        }
        async fn get_user_by_email(&self, _: &str) -> CoreResult<UserCredentials> {
            unimplemented!()
        }
        async fn list_users(&self) -> CoreResult<Vec<UserAccount>> {
            unimplemented!()
        }
        async fn set_user_role(&self, _: Uuid, _: Role, _: Uuid) -> CoreResult<UserAccount> {
            unimplemented!()
        }
        async fn deactivate_user(&self, _: Uuid) -> CoreResult<()> {
            unimplemented!()
        }
        async fn record_login(&self, _: Uuid) -> CoreResult<()> {
            unimplemented!()
        }
        async fn bump_bibliography_count(&self, _: Uuid) -> CoreResult<()> {
            unimplemented!()
        }
        async fn update_user_preferences(
            &self,
            _: Uuid,
            _: &UserPreferences,
        ) -> CoreResult<()> {
            unimplemented!()
        }
        async fn count_users(&self) -> CoreResult<u64> {
            unimplemented!()
        }
        async fn create_auth_session(
            &self,
            _: &str,
            _: Uuid,
            _: DateTime<Utc>,
        ) -> CoreResult<()> {
            unimplemented!()
        }
        async fn validate_auth_session(&self, _: &str) -> CoreResult<Uuid> {
            unimplemented!()
        }
        async fn delete_auth_session(&self, _: &str) -> CoreResult<()> {
            unimplemented!()
        }
    }

    fn forty_five_records() -> MemoryDb {
        let records = (0..45)
            .map(|i| record(&format!("Title {i}"), "Author", "2000", None))
            .collect();
        MemoryDb { records }
    }

    #[tokio::test]
    async fn search_pages_truncate_at_the_end() {
        let db = forty_five_records();
        let mut query = SearchQuery { page: 3, ..Default::default() };

        let results = search(&db, &query).await.unwrap();
        assert_eq!(results.total, 45);
        assert_eq!(results.total_pages, 3);
        assert_eq!(results.records.len(), 5);

        query.page = 4;
        let results = search(&db, &query).await.unwrap();
        assert_eq!(results.records.len(), 0);
        assert_eq!(results.page, 4);
        assert_eq!(results.total_pages, 3);
    }

    #[tokio::test]
    async fn export_applies_substring_filters_including_year() {
        let db = MemoryDb {
            records: vec![
                record("A", "Refsing", "1986", None),
                record("B", "Tamura", "1996-2000", None),
            ],
        };
        // For export, "year" is a substring match rather than a range parse.
        let csv = export_csv(&db, &[(FilterField::Year, "1996".to_string())])
            .await
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"Tamura\""));
    }
}
