//! Per-file processing pipeline
//!
//! fetch -> parse -> enrich -> frame -> send, one row at a time. The outbound
//! stream is opened first and closed on every exit path; a file that fails
//! part way leaves the downstream consumer with a stream missing its sentinel.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::codec::RowReader;
use crate::config::StreamConfig;
use crate::consumer::FileProcessor;
use crate::enrichment::MetadataLookup;
use crate::error::PipelineError;
use crate::model::{ColumnLayout, CsvRow, Enrichment, EnrichedRow};
use crate::storage::ObjectStore;
use crate::stream::{OutboundStream, StreamConnector, StreamHeader};

/// Outcome of one successfully streamed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub request_id: Uuid,
    pub rows_sent: u64,
    pub rows_enriched: u64,
}

/// Values copied into every stream header
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub callback_url: String,
    pub layout: ColumnLayout,
}

impl From<&StreamConfig> for PipelineSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            callback_url: config.callback_url.clone(),
            layout: config.columns,
        }
    }
}

pub struct FilePipeline<C> {
    store: Arc<dyn ObjectStore>,
    lookup: Arc<dyn MetadataLookup>,
    connector: C,
    settings: PipelineSettings,
}

impl<C: StreamConnector> FilePipeline<C> {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        lookup: Arc<dyn MetadataLookup>,
        connector: C,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            lookup,
            connector,
            settings,
        }
    }

    /// Stream one file to the downstream consumer
    pub async fn process(&self, file_key: &str) -> Result<ProcessSummary, PipelineError> {
        let header = StreamHeader::new(self.settings.layout, &self.settings.callback_url, file_key);
        let span = info_span!("process_file", request_id = %header.request_id, file = %file_key);

        async move {
            let stream = self.connector.connect().await?;

            let result = self.stream_file(&stream, &header).await;

            // Close even when streaming failed; the first error wins.
            let closed = stream.close().await;
            let summary = result?;
            closed?;

            info!(
                rows_sent = summary.rows_sent,
                rows_enriched = summary.rows_enriched,
                "File streamed"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn stream_file(
        &self,
        stream: &OutboundStream<C::Writer>,
        header: &StreamHeader,
    ) -> Result<ProcessSummary, PipelineError> {
        let layout = self.settings.layout;
        let object = self.store.fetch(&header.filename).await?;
        let mut rows = RowReader::new(object);

        stream.send_header(header).await?;
        stream.send_columns(layout).await?;

        let mut summary = ProcessSummary {
            request_id: header.request_id,
            rows_sent: 0,
            rows_enriched: 0,
        };

        while let Some(row) = rows.next_row().await? {
            let enriched = self.enrich(row).await;
            if !enriched.enrichment.is_empty() {
                summary.rows_enriched += 1;
            }

            stream.send_row(&enriched, layout).await?;
            summary.rows_sent += 1;
        }

        stream.send_end().await?;
        Ok(summary)
    }

    async fn enrich(&self, row: CsvRow) -> EnrichedRow {
        if !row.has_isbn() {
            debug!(title = %row.title, "No ISBN, skipping lookup");
            return row.enrich(Enrichment::default());
        }

        match self.lookup.lookup(&row.isbn_13).await {
            Ok(enrichment) => row.enrich(enrichment),
            Err(e) => {
                warn!(isbn = %row.isbn_13, error = %e, "Lookup failed, sending row without metadata");
                debug!("{}", row);
                row.enrich(Enrichment::default())
            }
        }
    }
}

#[async_trait]
impl<C> FileProcessor for FilePipeline<C>
where
    C: StreamConnector,
{
    async fn process(&self, file_key: &str) -> Result<ProcessSummary, PipelineError> {
        FilePipeline::process(self, file_key).await
    }
}
