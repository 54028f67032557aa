//! Mock artifact storage for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::context::RunContext;
use crate::sink::{validate_artifact, ArtifactSink, ObjectStore, SinkError};
use crate::wallet::WalletArtifact;

/// Mock implementation of the ArtifactSink trait.
///
/// Keeps artifacts in memory and returns `mock://<platform>/<file_name>`.
#[derive(Debug, Default)]
pub struct MockArtifactSink {
    stored: Arc<RwLock<Vec<(String, WalletArtifact)>>>,
    next_error: Arc<RwLock<Option<SinkError>>>,
}

impl MockArtifactSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored `(location, artifact)` pairs in call order.
    pub async fn stored(&self) -> Vec<(String, WalletArtifact)> {
        self.stored.read().await.clone()
    }

    /// Fail the next store with `error`.
    pub async fn set_next_error(&self, error: SinkError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl ArtifactSink for MockArtifactSink {
    fn name(&self) -> &str {
        "mock"
    }

    async fn store(
        &self,
        artifact: &WalletArtifact,
        ctx: &RunContext,
    ) -> Result<String, SinkError> {
        validate_artifact(artifact)?;
        ctx.check()?;
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let location = format!("mock://{}/{}", artifact.platform, artifact.file_name);
        self.stored
            .write()
            .await
            .push((location.clone(), artifact.clone()));
        Ok(location)
    }
}

/// An object held by [`InMemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory implementation of the ObjectStore trait.
///
/// Presigned URLs look like `https://objects.test/<key>?expires=<ttl secs>`.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    next_error: Arc<RwLock<Option<SinkError>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Fail the next put or presign with `error`.
    pub async fn set_next_error(&self, error: SinkError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), SinkError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, SinkError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if !self.objects.read().await.contains_key(key) {
            return Err(SinkError::ObjectStore {
                key: key.to_string(),
                message: "no such key".to_string(),
            });
        }
        Ok(format!("https://objects.test/{}?expires={}", key, ttl.as_secs()))
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
