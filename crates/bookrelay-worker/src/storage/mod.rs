//! Object retrieval
//!
//! [`ObjectStore`] hands back a readable stream for a key. [`Storage`] is the
//! S3-compatible implementation used in production; [`MemoryStore`] serves
//! fixed objects for local runs and tests.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    Client,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, instrument};

use crate::error::StorageError;

pub mod config;

/// Readable body of a fetched object
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Source of CSV objects, shared read-only between pipeline tasks
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open the object stored under `key` for streaming reads
    async fn fetch(&self, key: &str) -> Result<ObjectReader, StorageError>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub fn new(config: config::StorageConfig) -> Self {
        debug!("Initializing storage with config: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "bookrelay-storage",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .force_path_style(config.path_style)
            .build();

        let client = Client::from_conf(s3_config);

        info!(bucket = %config.bucket, endpoint = %config.endpoint, "Storage client initialized");

        Self {
            client,
            bucket: config.bucket,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for Storage {
    #[instrument(skip(self))]
    async fn fetch(&self, key: &str) -> Result<ObjectReader, StorageError> {
        debug!("Getting stream from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Fetch {
                        key: key.to_string(),
                        message: DisplayErrorContext(e).to_string(),
                    }
                }
            })?;

        debug!(
            size = response.content_length().unwrap_or(-1),
            "Object stream opened"
        );

        Ok(Box::new(Box::pin(response.body.into_async_read())))
    }
}

/// In-memory object store
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new<K, V>(objects: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            objects: Arc::new(
                objects
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn fetch(&self, key: &str) -> Result<ObjectReader, StorageError> {
        let data = self
            .objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(Box::new(Cursor::new(data.clone())))
    }
}
