//! Line protocol spoken to the downstream consumer
//!
//! A stream is, in order: one header JSON line, one column-name line, zero or
//! more data lines and the [`END_OF_STREAM`] line. The downstream side has no
//! other completion signal; a stream without the sentinel is incomplete.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::model::ColumnLayout;

/// Terminal line of every complete stream
pub const END_OF_STREAM: &str = "endacabadofinalizadoanimalesco";

/// Root collection the downstream consumer stores rows under
pub const MAPPER_ROOT: &str = "books";

/// Element name of one row in the downstream model
pub const MAPPER_ITEM: &str = "book";

/// First line of a stream, describing the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamHeader {
    pub request_id: Uuid,
    pub mapper: Value,
    pub webhook_url: String,
    pub filename: String,
}

impl StreamHeader {
    /// Header for a new run with a fresh request id
    pub fn new(
        layout: ColumnLayout,
        webhook_url: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            mapper: schema_mapping(layout),
            webhook_url: webhook_url.into(),
            filename: filename.into(),
        }
    }
}

/// Static mapping from output columns to the downstream data model
pub fn schema_mapping(layout: ColumnLayout) -> Value {
    let mut schema = json!({
        "title": "title",
        "authors": "authors",
        "publisher": "publisher",
        "language": "language",
        "ISBN": {
            "isbn_10": "isbn_10",
            "isbn_13": "isbn_13"
        },
        "description": "description"
    });

    if layout == ColumnLayout::Full {
        if let Some(fields) = schema.as_object_mut() {
            fields.insert("smallThumbnail".to_string(), json!("smallThumbnail"));
            fields.insert("thumbnail".to_string(), json!("thumbnail"));
        }
    }

    json!({
        "root": MAPPER_ROOT,
        "item": MAPPER_ITEM,
        "schema": schema
    })
}
