//! E-mail delivery of signed passes.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailerConfig;
use crate::metrics::observe_external;
use crate::store::Channel;

use super::{Delivery, DeliveryError, DeliveryReceipt, DeliveryRequest};

/// File name the pass is attached under, whatever it was stored as.
pub const DEFAULT_ATTACHMENT_NAME: &str = "ticket.pkpass";

const PASS_MAIL_BODY: &str = r#"<html>
<body style="font-family: Helvetica, Arial, sans-serif; color: #333; font-size: 16px;">
  <p>Hi there,</p>
  <p>Thank you for your purchase! Your event ticket is attached below. You can add it directly to your Apple Wallet.</p>
  <p>Enjoy the event!<br>- The Team</p>
</body>
</html>
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A single HTML message with one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: MailAttachment,
}

/// Sends mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), DeliveryError>;
}

/// SMTP sender backed by lettre's async transport.
#[derive(Clone)]
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailSender {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: &MailerConfig) -> Result<Self, DeliveryError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| DeliveryError::Mail(format!("SMTP relay error: {}", e)))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }

    fn build_message(message: MailMessage) -> Result<Message, DeliveryError> {
        let from = parse_mailbox(&message.from)?;
        let to = parse_mailbox(&message.to)?;
        let content_type = ContentType::parse(&message.attachment.content_type).map_err(|e| {
            DeliveryError::Mail(format!(
                "invalid attachment content type {}: {}",
                message.attachment.content_type, e
            ))
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(message.html_body))
                    .singlepart(
                        Attachment::new(message.attachment.file_name)
                            .body(message.attachment.data, content_type),
                    ),
            )
            .map_err(|e| DeliveryError::Mail(format!("failed to build email: {}", e)))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, message: MailMessage) -> Result<(), DeliveryError> {
        let email = Self::build_message(message)?;

        let start = Instant::now();
        let result = self.transport.send(email).await;
        observe_external("smtp", "send", start.elapsed().as_secs_f64(), result.is_ok());

        result
            .map(|_| ())
            .map_err(|e| DeliveryError::Mail(format!("failed to send email: {}", e)))
    }
}

/// Mails signed passes to the purchaser.
pub struct MailDelivery {
    sender: Arc<dyn MailSender>,
    from: String,
    subject: String,
}

impl MailDelivery {
    pub fn new(
        sender: Arc<dyn MailSender>,
        from: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            from: from.into(),
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl Delivery for MailDelivery {
    fn name(&self) -> &str {
        "email"
    }

    async fn deliver(
        &self,
        request: &DeliveryRequest<'_>,
    ) -> Result<Option<DeliveryReceipt>, DeliveryError> {
        // Google objects are saved through the Wallet API, not mailed.
        if request.channel != Channel::AppleWallet {
            return Ok(None);
        }
        let to = request.purchaser_email.trim();
        if to.is_empty() {
            return Err(DeliveryError::MissingRecipient {
                ticket_id: request.ticket_id.to_string(),
            });
        }

        self.sender
            .send(MailMessage {
                from: self.from.clone(),
                to: to.to_string(),
                subject: self.subject.clone(),
                html_body: PASS_MAIL_BODY.to_string(),
                attachment: MailAttachment {
                    file_name: DEFAULT_ATTACHMENT_NAME.to_string(),
                    content_type: request.artifact.content_type.clone(),
                    data: request.artifact.data.clone(),
                },
            })
            .await?;

        info!(ticket_id = %request.ticket_id, to = %to, "Mailed pass");
        Ok(Some(DeliveryReceipt {
            method: "email".to_string(),
            location: Some(to.to_string()),
            reached_holder: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMailSender;
    use crate::wallet::WalletArtifact;

    fn artifact(platform: &str) -> WalletArtifact {
        WalletArtifact {
            platform: platform.to_string(),
            file_name: "it_1.pkpass".to_string(),
            content_type: "application/vnd.apple.pkpass".to_string(),
            data: b"pkpass".to_vec(),
        }
    }

    fn delivery(sender: Arc<MockMailSender>) -> MailDelivery {
        MailDelivery::new(sender, "tickets@hakuna.dev", "Your ticket")
    }

    #[tokio::test]
    async fn test_mails_apple_pass() {
        let sender = Arc::new(MockMailSender::new());
        let artifact = artifact("apple");
        let request = DeliveryRequest {
            ticket_id: "it_1",
            channel: Channel::AppleWallet,
            purchaser_email: " nala@example.com ",
            artifact: &artifact,
            stored_at: "/tickets/apple/it_1.pkpass",
        };

        let receipt = delivery(sender.clone())
            .deliver(&request)
            .await
            .unwrap()
            .unwrap();
        assert!(receipt.reached_holder);
        assert_eq!(receipt.location.as_deref(), Some("nala@example.com"));

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "nala@example.com");
        assert_eq!(sent[0].from, "tickets@hakuna.dev");
        assert_eq!(sent[0].subject, "Your ticket");
        assert!(sent[0].html_body.contains("Apple Wallet"));
        assert_eq!(sent[0].attachment.file_name, "ticket.pkpass");
        assert_eq!(sent[0].attachment.content_type, "application/vnd.apple.pkpass");
        assert_eq!(sent[0].attachment.data, b"pkpass");
    }

    #[tokio::test]
    async fn test_skips_google_channel() {
        let sender = Arc::new(MockMailSender::new());
        let artifact = artifact("google");
        let request = DeliveryRequest {
            ticket_id: "it_1",
            channel: Channel::GoogleWallet,
            purchaser_email: "nala@example.com",
            artifact: &artifact,
            stored_at: "/tickets/google/it_1.json",
        };

        assert!(delivery(sender.clone()).deliver(&request).await.unwrap().is_none());
        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipient() {
        let sender = Arc::new(MockMailSender::new());
        let artifact = artifact("apple");
        let request = DeliveryRequest {
            ticket_id: "it_1",
            channel: Channel::AppleWallet,
            purchaser_email: "",
            artifact: &artifact,
            stored_at: "/tickets/apple/it_1.pkpass",
        };

        let err = delivery(sender.clone()).deliver(&request).await.unwrap_err();
        assert!(matches!(err, DeliveryError::MissingRecipient { .. }));
        assert!(sender.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_sender_error_propagates() {
        let sender = Arc::new(MockMailSender::new());
        sender
            .set_next_error(DeliveryError::Mail("connection refused".to_string()))
            .await;
        let artifact = artifact("apple");
        let request = DeliveryRequest {
            ticket_id: "it_1",
            channel: Channel::AppleWallet,
            purchaser_email: "nala@example.com",
            artifact: &artifact,
            stored_at: "/tickets/apple/it_1.pkpass",
        };

        let err = delivery(sender).deliver(&request).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Mail(_)));
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let err = SmtpMailSender::build_message(MailMessage {
            from: "not an address".to_string(),
            to: "nala@example.com".to_string(),
            subject: "Your ticket".to_string(),
            html_body: PASS_MAIL_BODY.to_string(),
            attachment: MailAttachment {
                file_name: DEFAULT_ATTACHMENT_NAME.to_string(),
                content_type: "application/vnd.apple.pkpass".to_string(),
                data: vec![1, 2, 3],
            },
        })
        .unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }

    #[test]
    fn test_build_message_attaches_pass() {
        let email = SmtpMailSender::build_message(MailMessage {
            from: "tickets@hakuna.dev".to_string(),
            to: "nala@example.com".to_string(),
            subject: "Your ticket".to_string(),
            html_body: PASS_MAIL_BODY.to_string(),
            attachment: MailAttachment {
                file_name: DEFAULT_ATTACHMENT_NAME.to_string(),
                content_type: "application/vnd.apple.pkpass".to_string(),
                data: b"pkpass".to_vec(),
            },
        })
        .unwrap();

        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("Subject: Your ticket"));
        assert!(raw.contains("application/vnd.apple.pkpass"));
        assert!(raw.contains("filename=\"ticket.pkpass\""));
    }
}
