use bookrelay_common::{RelayError, Result};
use serde::{Deserialize, Serialize};

use crate::config::{env_or, required_env};

/// Default bucket holding the uploaded CSV files
pub const DEFAULT_BUCKET: &str = "TP3";

/// Region used when the provider ignores it (R2, MinIO)
pub const DEFAULT_REGION: &str = "auto";

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl StorageConfig {
    /// Read the object store settings.
    ///
    /// Endpoint and credentials are mandatory; the legacy `ENDPOINT`,
    /// `ACCESS_KEY` and `SECRET_KEY` names are accepted as fallbacks.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            endpoint: required_env("S3_ENDPOINT", &["ENDPOINT"])?,
            region: env_or("S3_REGION", DEFAULT_REGION),
            bucket: env_or("S3_BUCKET", DEFAULT_BUCKET),
            access_key: required_env("S3_ACCESS_KEY", &["ACCESS_KEY"])?,
            secret_key: required_env("S3_SECRET_KEY", &["SECRET_KEY"])?,
            path_style: match std::env::var("S3_PATH_STYLE") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| RelayError::invalid_env("S3_PATH_STYLE", v))?,
                Err(_) => true,
            },
        };

        if config.bucket.is_empty() {
            return Err(RelayError::Config("S3 bucket name cannot be empty".to_string()));
        }

        Ok(config)
    }

    #[cfg(test)]
    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: DEFAULT_REGION.to_string(),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }
}
