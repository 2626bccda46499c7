//! Streaming CSV decoder for the source objects
//!
//! The first line is the column header and is never yielded. Rows are decoded
//! one at a time, so the object is never held in memory as a whole. Any
//! malformed record ends the sequence with an error; there is no
//! skip-and-continue.

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use tokio::io::AsyncRead;

use crate::error::CsvError;
use crate::model::CsvRow;

/// Lazy reader producing one [`CsvRow`] per call
pub struct RowReader<R> {
    reader: AsyncReader<R>,
    record: StringRecord,
}

impl<R> RowReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(input: R) -> Self {
        let reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .create_reader(input);

        Self {
            reader,
            record: StringRecord::new(),
        }
    }

    /// Decode the next data row, or `None` once the input is exhausted
    pub async fn next_row(&mut self) -> Result<Option<CsvRow>, CsvError> {
        if !self.reader.read_record(&mut self.record).await? {
            return Ok(None);
        }

        if self.record.len() < CsvRow::SOURCE_COLUMNS {
            return Err(CsvError::TooFewColumns {
                line: self.record.position().map(|p| p.line()).unwrap_or(0),
                expected: CsvRow::SOURCE_COLUMNS,
                found: self.record.len(),
            });
        }

        let field = |i: usize| self.record.get(i).unwrap_or_default().to_string();

        Ok(Some(CsvRow {
            title: field(0),
            authors: field(1),
            publisher: field(2),
            language: field(3),
            isbn_10: field(4),
            isbn_13: field(5),
        }))
    }
}
