//! S3-compatible retrieval gateway.

use std::time::Instant;

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::{debug, warn};

use etl_core::{Error, Result, RetrievalError, RetrievalGateway};

use crate::config::StorageConfig;

/// Fetches objects from MinIO or any S3-compatible store.
///
/// Buckets are addressed path-style (`http://host/bucket/key`), which MinIO
/// requires when no virtual-host DNS is configured. The bucket comes from each
/// event, so a handle is built per request from the shared credentials.
pub struct S3RetrievalGateway {
    region: Region,
    credentials: Credentials,
}

impl S3RetrievalGateway {
    /// Create a gateway from connection settings.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| Error::Config(format!("Invalid object store credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint_url(),
        };

        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| Error::Config(format!("Invalid bucket '{}': {}", name, e)))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait]
impl RetrievalGateway for S3RetrievalGateway {
    async fn fetch(&self, bucket: &str, object_key: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        let handle = self.bucket(bucket)?;

        match handle.get_object(object_key).await {
            Ok(response) => {
                let data = response.bytes().to_vec();
                debug!(
                    component = "storage",
                    op = "fetch",
                    bucket,
                    object_key,
                    bytes = data.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Object fetched"
                );
                Ok(data)
            }
            Err(e) => {
                let err = classify(e, bucket, object_key);
                warn!(
                    component = "storage",
                    op = "fetch",
                    bucket,
                    object_key,
                    error = %err,
                    "Object fetch failed"
                );
                Err(Error::Retrieval(err))
            }
        }
    }
}

/// Map a client error onto the retrieval taxonomy.
fn classify(err: S3Error, bucket: &str, object_key: &str) -> RetrievalError {
    match err {
        S3Error::HttpFailWithBody(status, body) => classify_status(status, &body, bucket, object_key),
        other => RetrievalError::Transport(other.to_string()),
    }
}

fn classify_status(status: u16, body: &str, bucket: &str, object_key: &str) -> RetrievalError {
    match status {
        404 => RetrievalError::NotFound {
            bucket: bucket.to_string(),
            key: object_key.to_string(),
        },
        401 | 403 => RetrievalError::AccessDenied {
            bucket: bucket.to_string(),
            key: object_key.to_string(),
        },
        _ => RetrievalError::Transport(format!("HTTP {}: {}", status, body.trim())),
    }
}
