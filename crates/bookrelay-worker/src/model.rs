//! Row model
//!
//! A [`CsvRow`] is what the source file provides. Enrichment never mutates it;
//! [`CsvRow::enrich`] consumes the row and yields an [`EnrichedRow`] that is
//! ready to be framed onto the outbound stream.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CsvError;

/// Field delimiter of the outbound stream
pub const FIELD_DELIMITER: char = ',';

/// Replacement written in place of a delimiter found inside a field
pub const DELIMITER_SUBSTITUTE: char = '|';

/// ISBN-13 value marking a row without identifier; such rows are never looked up
pub const MISSING_ISBN: &str = "N/A";

/// Column set written to the downstream consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnLayout {
    /// All nine columns, thumbnails included
    #[default]
    Full,
    /// Seven columns, up to and including the description
    Reduced,
}

impl ColumnLayout {
    const FULL_COLUMNS: [&'static str; 9] = [
        "title",
        "authors",
        "publisher",
        "language",
        "isbn_10",
        "isbn_13",
        "description",
        "smallThumbnail",
        "thumbnail",
    ];

    /// Column names in output order
    pub fn columns(self) -> &'static [&'static str] {
        &Self::FULL_COLUMNS[..self.width()]
    }

    /// Number of fields per data line
    pub fn width(self) -> usize {
        match self {
            ColumnLayout::Full => 9,
            ColumnLayout::Reduced => 7,
        }
    }

    /// The column-name record
    pub fn header_line(self) -> String {
        self.columns().join(",")
    }
}

impl std::str::FromStr for ColumnLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(ColumnLayout::Full),
            "reduced" => Ok(ColumnLayout::Reduced),
            other => Err(format!("unknown column layout '{}'", other)),
        }
    }
}

/// One data row as read from the source CSV
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CsvRow {
    pub title: String,
    pub authors: String,
    pub publisher: String,
    pub language: String,
    pub isbn_10: String,
    pub isbn_13: String,
}

impl CsvRow {
    /// Number of source columns a row must provide
    pub const SOURCE_COLUMNS: usize = 6;

    /// Whether the row carries an identifier worth looking up
    pub fn has_isbn(&self) -> bool {
        self.isbn_13 != MISSING_ISBN
    }

    /// Attach enrichment metadata, producing the row that goes on the wire
    pub fn enrich(self, enrichment: Enrichment) -> EnrichedRow {
        EnrichedRow {
            row: self,
            enrichment,
        }
    }
}

impl fmt::Display for CsvRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Authors: {}", self.authors)?;
        writeln!(f, "Publisher: {}", self.publisher)?;
        writeln!(f, "Language: {}", self.language)?;
        writeln!(f, "ISBN-10: {}", self.isbn_10)?;
        write!(f, "ISBN-13: {}", self.isbn_13)
    }
}

/// Metadata returned by the lookup service; empty fields when unavailable
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enrichment {
    pub description: String,
    pub small_thumbnail_url: String,
    pub thumbnail_url: String,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.small_thumbnail_url.is_empty()
            && self.thumbnail_url.is_empty()
    }
}

/// A source row joined with its (possibly empty) enrichment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichedRow {
    pub row: CsvRow,
    pub enrichment: Enrichment,
}

impl EnrichedRow {
    /// Render the row as one delimiter-joined line, without terminator.
    ///
    /// Delimiters inside a field become [`DELIMITER_SUBSTITUTE`] and line
    /// breaks become spaces, so the line always has `layout.width()` fields.
    pub fn to_line(&self, layout: ColumnLayout) -> String {
        let fields = self.fields();
        let mut line = String::new();
        for (i, field) in fields.iter().take(layout.width()).enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            line.extend(field.chars().map(sanitize_char));
        }
        line
    }

    /// Parse a line produced by [`EnrichedRow::to_line`].
    ///
    /// Substituted delimiters are not restored.
    pub fn parse_line(line: &str, layout: ColumnLayout) -> Result<Self, CsvError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != layout.width() {
            return Err(CsvError::FieldCount {
                expected: layout.width(),
                found: fields.len(),
            });
        }

        let field = |i: usize| fields.get(i).map(|s| s.to_string()).unwrap_or_default();

        Ok(Self {
            row: CsvRow {
                title: field(0),
                authors: field(1),
                publisher: field(2),
                language: field(3),
                isbn_10: field(4),
                isbn_13: field(5),
            },
            enrichment: Enrichment {
                description: field(6),
                small_thumbnail_url: field(7),
                thumbnail_url: field(8),
            },
        })
    }

    fn fields(&self) -> [&str; 9] {
        [
            &self.row.title,
            &self.row.authors,
            &self.row.publisher,
            &self.row.language,
            &self.row.isbn_10,
            &self.row.isbn_13,
            &self.enrichment.description,
            &self.enrichment.small_thumbnail_url,
            &self.enrichment.thumbnail_url,
        ]
    }
}

fn sanitize_char(c: char) -> char {
    match c {
        FIELD_DELIMITER => DELIMITER_SUBSTITUTE,
        '\r' | '\n' => ' ',
        other => other,
    }
}
