use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::sink::{object_key, ObjectStore};

use super::{Delivery, DeliveryError, DeliveryReceipt, DeliveryRequest};

/// Seven days, the longest presign lifetime S3 accepts.
pub(crate) const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Uploads the artifact to object storage and hands back a presigned URL.
pub struct ObjectStoreUpload {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    presign_ttl: Duration,
}

impl ObjectStoreUpload {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            presign_ttl: DEFAULT_PRESIGN_TTL,
        }
    }

    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }
}

#[async_trait]
impl Delivery for ObjectStoreUpload {
    fn name(&self) -> &str {
        "object_store"
    }

    async fn deliver(
        &self,
        request: &DeliveryRequest<'_>,
    ) -> Result<Option<DeliveryReceipt>, DeliveryError> {
        let artifact = request.artifact;
        let key = object_key(&self.prefix, &artifact.platform, &artifact.file_name);

        info!(
            ticket_id = %request.ticket_id,
            channel = %request.channel,
            key = %key,
            "Uploading artifact"
        );
        self.store
            .put_object(&key, artifact.data.clone(), &artifact.content_type)
            .await?;
        let url = self.store.presign_get(&key, self.presign_ttl).await?;

        Ok(Some(DeliveryReceipt {
            method: "object_store".to_string(),
            location: Some(url),
            reached_holder: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkError;
    use crate::store::Channel;
    use crate::testing::InMemoryObjectStore;
    use crate::wallet::WalletArtifact;

    fn artifact() -> WalletArtifact {
        WalletArtifact {
            platform: "apple".to_string(),
            file_name: "it_1.pkpass".to_string(),
            content_type: "application/vnd.apple.pkpass".to_string(),
            data: b"pkpass".to_vec(),
        }
    }

    fn request(artifact: &WalletArtifact) -> DeliveryRequest<'_> {
        DeliveryRequest {
            ticket_id: "it_1",
            channel: Channel::AppleWallet,
            purchaser_email: "nala@example.com",
            artifact,
            stored_at: "/tickets/apple/it_1.pkpass",
        }
    }

    #[tokio::test]
    async fn test_uploads_and_presigns() {
        let store = Arc::new(InMemoryObjectStore::new());
        let upload = ObjectStoreUpload::new(store.clone(), "passes")
            .with_presign_ttl(Duration::from_secs(3600));
        let artifact = artifact();

        let receipt = upload.deliver(&request(&artifact)).await.unwrap().unwrap();

        assert_eq!(receipt.method, "object_store");
        assert!(!receipt.reached_holder);
        assert_eq!(
            receipt.location.as_deref(),
            Some("https://objects.test/passes/apple/it_1.pkpass?expires=3600")
        );
        let object = store.get("passes/apple/it_1.pkpass").await.unwrap();
        assert_eq!(object.data, b"pkpass");
    }

    #[tokio::test]
    async fn test_upload_error_is_returned() {
        let store = Arc::new(InMemoryObjectStore::new());
        store
            .set_next_error(SinkError::ObjectStore {
                key: "passes/apple/it_1.pkpass".to_string(),
                message: "access denied".to_string(),
            })
            .await;
        let upload = ObjectStoreUpload::new(store.clone(), "passes");
        let artifact = artifact();

        let err = upload.deliver(&request(&artifact)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Upload(SinkError::ObjectStore { .. })));
        assert!(store.get("passes/apple/it_1.pkpass").await.is_none());
    }
}
