//! S3-compatible object storage for uploaded images
//!
//! Works against AWS S3 or compatible services such as DigitalOcean Spaces.
//! Objects are written publicly readable and addressed by
//! `{public_base_url}/{key}`.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client,
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StorageConfig;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("Delete of {key} failed: {message}")]
    Delete { key: String, message: String },

    #[error("Cannot derive object key from {0}")]
    InvalidUrl(String),
}

/// Minimal object store surface used by the catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

/// `aws-sdk-s3` backed store
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from configuration.
    ///
    /// Static credentials are used when both key and secret are configured,
    /// otherwise the default AWS provider chain applies.
    pub async fn new(config: &StorageConfig) -> Self {
        info!(bucket = %config.bucket, region = %config.region, "Initializing S3 client");

        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(key), Some(secret)) => aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(
                    key.clone(),
                    secret.clone(),
                    None,
                    None,
                    "catalog-config",
                )),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!(key, bytes = body.len(), "Uploading object");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        debug!(key, "Deleting object");

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}

/// Object key for an upload: `{folder}/{millis}-{tag}-{name}`.
///
/// The name is lowercased with spaces turned into dashes; `tag` is eight random
/// hex characters so equal names uploaded in the same millisecond stay apart.
pub fn object_key(folder: &str, millis: i64, original_name: &str) -> String {
    let name: String = original_name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let name = name.replace(['/', '\\'], "-");
    let name = if name.is_empty() { "image".to_string() } else { name };

    let mut tag = Uuid::new_v4().simple().to_string();
    tag.truncate(8);

    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{}-{}-{}", millis, tag, name)
    } else {
        format!("{}/{}-{}-{}", folder, millis, tag, name)
    }
}

/// Recover the object key from a stored URL.
///
/// URLs under `public_base_url` lose that prefix; other absolute URLs use their
/// path; relative values lose one leading slash.
pub fn key_from_url(url: &str, public_base_url: &str) -> Result<String, StorageError> {
    let url = url.trim();
    let base = public_base_url.trim_end_matches('/');

    let raw_key = if let Some(rest) = url.strip_prefix(base).and_then(|r| r.strip_prefix('/')) {
        rest.to_string()
    } else if url.starts_with("http://") || url.starts_with("https://") {
        let parsed = url::Url::parse(url).map_err(|_| StorageError::InvalidUrl(url.to_string()))?;
        parsed.path().trim_start_matches('/').to_string()
    } else {
        url.strip_prefix('/').unwrap_or(url).to_string()
    };

    let key = match urlencoding::decode(&raw_key) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw_key.clone(),
    };

    if key.is_empty() {
        return Err(StorageError::InvalidUrl(url.to_string()));
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://assets.blr1.digitaloceanspaces.com";

    /// Splits `{millis}-{tag}-{name}` after the folder prefix
    fn parts(key: &str) -> (&str, &str, &str) {
        let mut it = key.splitn(3, '-');
        (it.next().unwrap(), it.next().unwrap(), it.next().unwrap())
    }

    #[test]
    fn test_object_key() {
        let key = object_key("uploads", 1700000000000, "Ball Valve  Front.PNG");
        let (millis, tag, name) = parts(key.strip_prefix("uploads/").unwrap());
        assert_eq!(millis, "1700000000000");
        assert_eq!(tag.len(), 8);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, "ball-valve-front.png");

        let key = object_key("/", 5, "  ");
        let (millis, _, name) = parts(&key);
        assert_eq!((millis, name), ("5", "image"));
    }

    #[test]
    fn test_same_name_same_millisecond_gets_distinct_keys() {
        let first = object_key("uploads", 1700000000000, "valve.png");
        let second = object_key("uploads", 1700000000000, "valve.png");
        assert_ne!(first, second);
        assert!(first.ends_with("-valve.png") && second.ends_with("-valve.png"));
    }

    #[test]
    fn test_key_from_public_url() {
        assert_eq!(
            key_from_url(&format!("{}/uploads/1-a.jpg", BASE), BASE).unwrap(),
            "uploads/1-a.jpg"
        );
    }

    #[test]
    fn test_key_from_foreign_absolute_url() {
        assert_eq!(
            key_from_url("https://cdn.example.com/uploads/1-b%20c.jpg", BASE).unwrap(),
            "uploads/1-b c.jpg"
        );
    }

    #[test]
    fn test_key_from_relative_path() {
        assert_eq!(key_from_url("/uploads/2-x.jpg", BASE).unwrap(), "uploads/2-x.jpg");
        assert_eq!(key_from_url("uploads/2-x.jpg", BASE).unwrap(), "uploads/2-x.jpg");
        assert!(key_from_url("/", BASE).is_err());
    }
}
