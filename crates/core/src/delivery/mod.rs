//! Post-persistence delivery of artifacts: uploads and e-mail.

mod mail;
mod upload;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::sink::SinkError;
use crate::store::Channel;
use crate::wallet::WalletArtifact;

pub use mail::{
    MailAttachment, MailDelivery, MailMessage, MailSender, SmtpMailSender, DEFAULT_ATTACHMENT_NAME,
};
pub use upload::ObjectStoreUpload;

/// Everything a delivery needs to know about one produced pass.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRequest<'a> {
    pub ticket_id: &'a str,
    pub channel: Channel,
    pub purchaser_email: &'a str,
    pub artifact: &'a WalletArtifact,
    /// Where the sink stored the artifact.
    pub stored_at: &'a str,
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Delivery method tag, e.g. "email" or "object_store".
    pub method: String,
    /// Recipient address or URL, when there is one.
    pub location: Option<String>,
    /// Whether the pass is now in the holder's hands.
    pub reached_holder: bool,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("ticket {ticket_id} has no purchaser e-mail")]
    MissingRecipient { ticket_id: String },

    #[error("invalid mail address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("upload failed: {0}")]
    Upload(#[from] SinkError),
}

/// A step that hands a persisted artifact to somebody or somewhere.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the delivery does not apply to this request.
    async fn deliver(
        &self,
        request: &DeliveryRequest<'_>,
    ) -> Result<Option<DeliveryReceipt>, DeliveryError>;
}
