//! Object storage sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::context::RunContext;
use crate::wallet::WalletArtifact;

use super::{validate_artifact, ArtifactSink, SinkError};

/// Minimal object storage operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &str;

    /// Upload `data` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), SinkError>;

    /// Time-bounded read URL for `key`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, SinkError>;

    /// Stable address of `key` (e.g. `s3://bucket/key`).
    fn location(&self, key: &str) -> String;
}

/// `<prefix>/<platform>/<file_name>`, without a leading slash when the
/// prefix is empty.
pub fn object_key(prefix: &str, platform: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", platform, file_name)
    } else {
        format!("{}/{}/{}", prefix, platform, file_name)
    }
}

/// Stores artifacts directly in object storage.
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreSink {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl ArtifactSink for ObjectStoreSink {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn store(
        &self,
        artifact: &WalletArtifact,
        ctx: &RunContext,
    ) -> Result<String, SinkError> {
        validate_artifact(artifact)?;
        ctx.check()?;

        let key = object_key(&self.prefix, &artifact.platform, &artifact.file_name);
        ctx.run(
            self.store
                .put_object(&key, artifact.data.clone(), &artifact.content_type),
        )
        .await??;

        debug!(key = %key, bytes = artifact.data.len(), "Uploaded artifact");
        Ok(self.store.location(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryObjectStore;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("passes", "apple", "it_1.pkpass"), "passes/apple/it_1.pkpass");
        assert_eq!(object_key("/passes/", "google", "it_1.json"), "passes/google/it_1.json");
        assert_eq!(object_key("", "apple", "it_1.pkpass"), "apple/it_1.pkpass");
    }

    #[tokio::test]
    async fn test_store_uploads_under_prefix() {
        let store = Arc::new(InMemoryObjectStore::new());
        let sink = ObjectStoreSink::new(store.clone(), "passes");

        let artifact = WalletArtifact {
            platform: "google".to_string(),
            file_name: "it_9.json".to_string(),
            content_type: "application/json".to_string(),
            data: b"{}".to_vec(),
        };
        let location = sink.store(&artifact, &RunContext::new()).await.unwrap();

        assert_eq!(location, "memory://passes/google/it_9.json");
        let object = store.get("passes/google/it_9.json").await.unwrap();
        assert_eq!(object.data, b"{}");
        assert_eq!(object.content_type, "application/json");
    }
}
