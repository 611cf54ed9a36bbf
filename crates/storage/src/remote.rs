//! Remote object storage (the public NOAA imagery buckets).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};

/// A listed remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHandle {
    /// Full key within the bucket
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Listing and download operations the pipeline needs from a bucket.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List all objects under `prefix`.
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectHandle>>;

    /// Download `handle` to `dest`, returning the number of bytes written.
    async fn download(&self, handle: &ObjectHandle, dest: &Path) -> StorageResult<u64>;
}

/// Connection settings for an S3 bucket.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub bucket: String,
    pub region: String,
    /// Unsigned requests are used when either key is missing.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-goes16".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// [`RemoteStore`] over any `object_store` backend.
pub struct ObjectStoreRemote {
    store: Arc<dyn ObjectStore>,
    label: String,
}

impl ObjectStoreRemote {
    pub fn new(store: Arc<dyn ObjectStore>, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// Build an S3 client. Retries are disabled: a failed request is retried
    /// by the next poll cycle, not within this one.
    pub fn from_config(config: &RemoteStoreConfig) -> StorageResult<Self> {
        let options = ClientOptions::new()
            .with_timeout(config.request_timeout)
            .with_connect_timeout(config.connect_timeout);
        let retry = RetryConfig {
            max_retries: 0,
            ..Default::default()
        };

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_client_options(options)
            .with_retry(retry);

        match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => {
                builder = builder
                    .with_access_key_id(key)
                    .with_secret_access_key(secret);
            }
            _ => {
                builder = builder.with_skip_signature(true);
            }
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Client(format!("S3 bucket {}: {}", config.bucket, e)))?;

        Ok(Self::new(Arc::new(store), format!("s3://{}", config.bucket)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl RemoteStore for ObjectStoreRemote {
    #[instrument(skip(self), fields(store = %self.label))]
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectHandle>> {
        let prefix_path = ObjectPath::from(prefix);

        let metas: Vec<_> = self
            .store
            .list(Some(&prefix_path))
            .try_collect()
            .await
            .map_err(|e| StorageError::from_object_store(e, prefix))?;

        let handles: Vec<ObjectHandle> = metas
            .into_iter()
            .map(|meta| ObjectHandle {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .collect();

        debug!(count = handles.len(), "Listed remote objects");
        Ok(handles)
    }

    #[instrument(skip(self, handle), fields(store = %self.label, key = %handle.key))]
    async fn download(&self, handle: &ObjectHandle, dest: &Path) -> StorageResult<u64> {
        let location = ObjectPath::from(handle.key.as_str());
        let bytes = self
            .store
            .get(&location)
            .await
            .map_err(|e| StorageError::from_object_store(e, &handle.key))?
            .bytes()
            .await
            .map_err(|e| StorageError::from_object_store(e, &handle.key))?;

        // written under a `.partial` sibling, renamed into place when complete
        let partial = dest.with_extension(match dest.extension() {
            Some(ext) => format!("{}.partial", ext.to_string_lossy()),
            None => "partial".to_string(),
        });
        tokio::fs::write(&partial, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, dest).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        debug!(size = bytes.len(), dest = %dest.display(), "Downloaded object");
        Ok(bytes.len() as u64)
    }
}
