//! crates/biblio_core/src/csv.rs
//!
//! CSV serialization for bibliography exports. The column order is fixed and
//! part of the export contract; the header row is always emitted, even for an
//! empty result set.

use crate::domain::BibliographyRecord;
use crate::query::FilterField;

/// Export columns, in order.
pub const EXPORT_COLUMNS: [FilterField; 16] = [
    FilterField::Author,
    FilterField::Year,
    FilterField::Title,
    FilterField::Publication,
    FilterField::Publisher,
    FilterField::BiblioName,
    FilterField::LanguagePublished,
    FilterField::LanguageResearched,
    FilterField::CountryOfResearch,
    FilterField::Keywords,
    FilterField::Isbn,
    FilterField::Issn,
    FilterField::Url,
    FilterField::DateOfEntry,
    FilterField::Source,
    FilterField::LanguageFamily,
];

impl FilterField {
    /// Human-readable column heading used in the export header row.
    pub fn label(&self) -> &'static str {
        match self {
            FilterField::Title => "Title",
            FilterField::Author => "Author",
            FilterField::Year => "Year",
            FilterField::Publication => "Publication",
            FilterField::Publisher => "Publisher",
            FilterField::BiblioName => "Biblio Name",
            FilterField::LanguagePublished => "Language Published",
            FilterField::LanguageResearched => "Language Researched",
            FilterField::CountryOfResearch => "Country of Research",
            FilterField::Keywords => "Keywords",
            FilterField::Isbn => "ISBN",
            FilterField::Issn => "ISSN",
            FilterField::Url => "URL",
            FilterField::DateOfEntry => "Date of Entry",
            FilterField::LanguageFamily => "Language Family",
            FilterField::Source => "Source",
        }
    }
}

/// Serializes records to CSV: a header row, then one quoted row per record.
/// Absent optional fields render as `""`.
pub fn serialize(records: &[BibliographyRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        EXPORT_COLUMNS
            .iter()
            .map(|column| column.label())
            .collect::<Vec<_>>()
            .join(","),
    );
    for record in records {
        let row = EXPORT_COLUMNS
            .iter()
            .map(|column| quote(record.field(*column).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(row);
    }
    lines.join("\n")
}

/// Wraps a value in double quotes, doubling any embedded quotes.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Author,Year,Title,Publication,Publisher,Biblio Name,\
Language Published,Language Researched,Country of Research,Keywords,ISBN,ISSN,\
URL,Date of Entry,Source,Language Family";

    #[test]
    fn empty_set_yields_header_only() {
        let output = serialize(&[]);
        assert_eq!(output, HEADER);
        assert_eq!(output.split(',').count(), 16);
    }

    #[test]
    fn missing_fields_render_as_empty_quotes() {
        let record = BibliographyRecord {
            id: "5f8f8c449d1e8b6a2c3d4e5f".to_string(),
            title: "Grammar of Ainu".to_string(),
            author: "Kirsten Refsing".to_string(),
            year: "1986".to_string(),
            keywords: Some("phonology".to_string()),
            ..Default::default()
        };
        let output = serialize(&[record]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "\"Kirsten Refsing\",\"1986\",\"Grammar of Ainu\",\"\",\"\",\"\",\"\",\"\",\"\",\"phonology\",\"\",\"\",\"\",\"\",\"\",\"\""
        );
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let record = BibliographyRecord {
            title: "The \"Ainu\" Question".to_string(),
            author: "A".to_string(),
            year: "1900".to_string(),
            ..Default::default()
        };
        let output = serialize(&[record]);
        assert!(output.contains("\"The \"\"Ainu\"\" Question\""));
    }
}
