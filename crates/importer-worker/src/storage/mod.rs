//! Object store gateway
//!
//! The importer only needs two calls against the upload bucket: fetch an
//! object with its content type and integrity tag, and delete it once its rows
//! are imported. [`ObjectStore`] is the seam the tasker depends on; [`Storage`]
//! is the S3 implementation.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    Client,
};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::error::FileError;

pub mod config;
pub mod retry;

pub use config::StorageConfig;
pub use retry::RetryPolicy;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage request for {key} failed: {message}")]
    Backend { key: String, message: String },
}

impl StorageError {
    pub fn backend(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    /// Missing objects stay missing; everything else may be transient
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<StorageError> for FileError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => FileError::storage(&key, "object not found"),
            StorageError::Backend { key, message } => FileError::StorageIo { key, message },
        }
    }
}

/// Object fetched from the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub content_type: Option<String>,
    /// Integrity tag as reported by the store, quotes included
    pub e_tag: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    retry: RetryPolicy,
}

impl Storage {
    pub async fn new(config: StorageConfig) -> anyhow::Result<Self> {
        debug!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            region = %config.region,
            "Initializing storage"
        );

        let mut s3_config_builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "importer-storage");
                aws_sdk_s3::Config::builder()
                    .behavior_version_latest()
                    .credentials_provider(credentials)
            },
            _ => {
                let shared = aws_config::load_from_env().await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        s3_config_builder = s3_config_builder
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());
        let retry = config.retry_policy();

        info!(bucket = %config.bucket, max_attempts = retry.max_attempts(), "Storage client initialized");

        Ok(Self {
            client,
            bucket: config.bucket,
            retry,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_once(&self, key: &str) -> Result<StoredObject, StorageError> {
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
                    StorageError::backend(key, DisplayErrorContext(&e))
                }
            })?;

        let content_type = response.content_type().map(str::to_string);
        let e_tag = response.e_tag().map(str::to_string);

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend(key, e))?
            .into_bytes()
            .to_vec();

        Ok(StoredObject {
            key: key.to_string(),
            content_type,
            e_tag,
            body,
        })
    }

    async fn delete_once(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::backend(key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for Storage {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let object = self.retry.run("get_object", || self.get_once(key)).await?;

        debug!(
            size = object.body.len(),
            content_type = ?object.content_type,
            e_tag = ?object.e_tag,
            "Downloaded s3://{}/{}",
            self.bucket,
            key
        );
        Ok(object)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        debug!("Deleting s3://{}/{}", self.bucket, key);

        self.retry.run("delete_object", || self.delete_once(key)).await?;

        info!("Successfully deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_storage_io() {
        let err: FileError = StorageError::NotFound("t1/a.csv".to_string()).into();
        assert_eq!(err.kind(), "storage_io_error");
        assert!(err.to_string().contains("t1/a.csv"));
    }

    #[test]
    fn test_retryable() {
        assert!(StorageError::backend("k", "reset").is_retryable());
        assert!(!StorageError::NotFound("k".to_string()).is_retryable());
    }

    #[tokio::test]
    async fn test_new_with_static_credentials() {
        let config = StorageConfig::for_minio("http://localhost:9000", "uploads");
        let storage = Storage::new(config).await.unwrap();
        assert_eq!(storage.bucket(), "uploads");
    }
}
