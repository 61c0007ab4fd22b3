//! S3-compatible object store (MinIO, AWS S3, ...).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTimeFormat};
use bytes::Bytes;
use futures::StreamExt;
use rawcache_core::Meta;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::store::{ObjectStore, StoredObject};

const BACKEND: &str = "s3";

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Settings {
    /// Endpoint URL, e.g. `http://minio:9000`. A bare `host:port` is
    /// treated as plain HTTP.
    #[serde(default)]
    pub endpoint: String,
    /// Access key id.
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Bucket holding both bodies and metadata records.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Signing region; MinIO accepts any value.
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_bucket() -> String {
    "proxy-cache".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: default_bucket(),
            region: default_region(),
        }
    }
}

impl S3Settings {
    /// Returns the endpoint with an explicit scheme.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else {
            format!("http://{}", self.endpoint)
        }
    }

    /// Returns the names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.endpoint.trim().is_empty() {
            missing.push("endpoint");
        }
        if self.access_key.is_empty() {
            missing.push("access_key");
        }
        if self.secret_key.is_empty() {
            missing.push("secret_key");
        }
        if self.bucket.trim().is_empty() {
            missing.push("bucket");
        }
        missing
    }
}

/// Object store backed by one S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Wraps an already-configured client.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds a client from settings and makes sure the bucket exists.
    pub async fn connect(settings: &S3Settings) -> Result<Self, StoreError> {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "rawcache-static",
        );

        let shared = aws_config::from_env()
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(settings.endpoint_url())
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        let store = Self::new(Client::from_conf(s3_config), settings.bucket.clone());
        store.ensure_bucket().await?;

        info!(
            endpoint = %settings.endpoint_url(),
            bucket = %settings.bucket,
            "S3 store connected"
        );
        Ok(store)
    }

    /// Returns the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Creates the bucket if it does not exist yet.
    async fn ensure_bucket(&self) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found()) =>
            {
                info!(bucket = %self.bucket, "bucket missing, creating it");
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| {
                        StoreError::backend(
                            BACKEND,
                            "CreateBucket",
                            &self.bucket,
                            DisplayErrorContext(&e).to_string(),
                        )
                    })?;
                Ok(())
            },
            Err(err) => Err(StoreError::unavailable(format!(
                "HeadBucket {}: {}",
                self.bucket,
                DisplayErrorContext(&err)
            ))),
        }
    }

    async fn put_bytes(
        &self,
        operation: &'static str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(data.len() as i64)
            .set_content_type(content_type.map(String::from))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StoreError::backend(BACKEND, operation, key, DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    debug!("object does not exist");
                    Ok(false)
                } else {
                    Err(StoreError::backend(
                        BACKEND,
                        "HeadObject",
                        key,
                        DisplayErrorContext(&err).to_string(),
                    ))
                }
            },
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StoreError::not_found(key)
                } else {
                    StoreError::backend(
                        BACKEND,
                        "GetObject",
                        key,
                        DisplayErrorContext(&err).to_string(),
                    )
                }
            })?;

        let last_modified = output
            .last_modified()
            .and_then(|t| t.fmt(DateTimeFormat::HttpDate).ok());
        let size = output.content_length().unwrap_or_default().max(0) as u64;
        let content_type = output.content_type().map(String::from);
        let etag = output.e_tag().map(String::from);

        let reader = output.body.into_async_read();

        Ok(StoredObject {
            body: ReaderStream::new(reader).boxed(),
            size,
            content_type,
            etag,
            last_modified,
        })
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, bytes = data.len()))]
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.put_bytes("PutObject", key, data, content_type).await?;
        debug!("object uploaded");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get_meta(&self, key: &str) -> Result<Option<Meta>, StoreError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Ok(None);
            },
            Err(err) => {
                return Err(StoreError::backend(
                    BACKEND,
                    "GetObject",
                    key,
                    DisplayErrorContext(&err).to_string(),
                ));
            },
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::backend(BACKEND, "GetObject", key, e.to_string()))?
            .into_bytes();

        match Meta::from_slice(&data) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable metadata record");
                Ok(None)
            },
        }
    }

    #[instrument(skip(self, meta), fields(bucket = %self.bucket))]
    async fn put_meta(&self, key: &str, meta: &Meta) -> Result<(), StoreError> {
        let data = Bytes::from(meta.to_vec()?);
        self.put_bytes("PutObject", key, data, Some("application/json"))
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                StoreError::unavailable(format!(
                    "bucket {} not reachable: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_adds_scheme() {
        let settings = S3Settings {
            endpoint: "minio:9000".into(),
            ..S3Settings::default()
        };
        assert_eq!(settings.endpoint_url(), "http://minio:9000");

        let settings = S3Settings {
            endpoint: "https://s3.example.com".into(),
            ..S3Settings::default()
        };
        assert_eq!(settings.endpoint_url(), "https://s3.example.com");
    }

    #[test]
    fn test_defaults() {
        let settings = S3Settings::default();

        assert_eq!(settings.bucket, "proxy-cache");
        assert_eq!(settings.region, "us-east-1");
    }

    #[test]
    fn test_missing_fields() {
        let settings = S3Settings::default();
        assert_eq!(
            settings.missing_fields(),
            vec!["endpoint", "access_key", "secret_key"]
        );

        let settings = S3Settings {
            endpoint: "http://minio:9000".into(),
            access_key: "a".into(),
            secret_key: "s".into(),
            ..S3Settings::default()
        };
        assert!(settings.missing_fields().is_empty());
    }

    #[test]
    fn test_new_keeps_bucket() {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let store = S3Store::new(Client::from_conf(config), "proxy-cache");

        assert_eq!(store.bucket(), "proxy-cache");
        assert_eq!(store.name(), "s3");
    }
}
