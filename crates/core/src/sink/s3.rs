//! Amazon S3 backed object store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::info;

use crate::config::ObjectStoreConfig;
use crate::metrics::observe_external;

use super::{ObjectStore, SinkError};

/// Private objects in a single bucket.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration (environment,
    /// profile, instance metadata), overriding the region when configured.
    pub async fn from_config(config: &ObjectStoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared = loader.load().await;
        Self::new(Client::new(&shared), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), SinkError> {
        let start = Instant::now();
        let bytes = data.len();
        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::Private)
            .send()
            .await;
        observe_external(
            "s3",
            "put_object",
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        result.map_err(|e| SinkError::ObjectStore {
            key: key.to_string(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        info!(bucket = %self.bucket, key = %key, bytes, "Uploaded object");
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, SinkError> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| SinkError::ObjectStore {
            key: key.to_string(),
            message: format!("invalid presign TTL: {}", e),
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| SinkError::ObjectStore {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(request.uri().to_string())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
