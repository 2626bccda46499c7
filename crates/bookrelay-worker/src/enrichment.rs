//! Metadata enrichment client
//!
//! Looks books up by ISBN on the Google Books volumes search and returns the
//! description and cover links of the first match. Lookups are never retried;
//! callers treat every error as "no metadata".

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::EnrichmentConfig;
use crate::error::EnrichmentError;
use crate::model::Enrichment;

/// Path of the volumes search endpoint, relative to the base URL
pub const VOLUMES_PATH: &str = "/books/v1/volumes";

/// Lookup of descriptive metadata by identifier
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, isbn: &str) -> Result<Enrichment, EnrichmentError>;
}

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Default, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    description: String,
    #[serde(rename = "imageLinks", default)]
    image_links: ImageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ImageLinks {
    #[serde(rename = "smallThumbnail", default)]
    small_thumbnail: String,
    #[serde(default)]
    thumbnail: String,
}

/// Strip the hyphens ISBNs are often printed with
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.trim().replace('-', "")
}

/// Google Books client
#[derive(Clone)]
pub struct GoogleBooksClient {
    client: Client,
    base_url: String,
}

impl GoogleBooksClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn volumes_url(&self) -> String {
        format!("{}{}", self.base_url, VOLUMES_PATH)
    }
}

#[async_trait]
impl MetadataLookup for GoogleBooksClient {
    #[instrument(skip(self))]
    async fn lookup(&self, isbn: &str) -> Result<Enrichment, EnrichmentError> {
        let isbn = normalize_isbn(isbn);
        if isbn.is_empty() {
            return Err(EnrichmentError::EmptyIdentifier);
        }

        let response = self
            .client
            .get(self.volumes_url())
            .query(&[("q", format!("isbn:{}", isbn))])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify)?;
        let volumes: VolumesResponse = serde_json::from_slice(&body)?;

        let volume = volumes
            .items
            .into_iter()
            .next()
            .ok_or_else(|| EnrichmentError::NotFound(isbn.clone()))?;

        debug!(
            has_description = !volume.volume_info.description.is_empty(),
            "Lookup matched"
        );

        let info = volume.volume_info;
        Ok(Enrichment {
            description: info.description,
            small_thumbnail_url: info.image_links.small_thumbnail,
            thumbnail_url: info.image_links.thumbnail,
        })
    }
}

fn classify(err: reqwest::Error) -> EnrichmentError {
    if err.is_timeout() {
        EnrichmentError::Timeout
    } else {
        EnrichmentError::Transport(err)
    }
}
