//! Mock pass generation collaborators.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::context::RunContext;
use crate::source::IssuedTicket;
use crate::store::Channel;
use crate::wallet::apple::{CredentialLoader, Pass, PassSigner, PassTemplate, SigningCredentials};
use crate::wallet::{GenerationError, PassGenerator, WalletArtifact};

/// Mock implementation of the PassGenerator trait.
///
/// Produces `<id>.mock` artifacts whose bytes are `mock:<id>` and records the
/// ticket IDs it was asked to generate, failed attempts included.
#[derive(Debug)]
pub struct MockPassGenerator {
    channel: Channel,
    generated: Arc<RwLock<Vec<String>>>,
    fail_for: Arc<RwLock<HashSet<String>>>,
    next_error: Arc<RwLock<Option<GenerationError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    cancel_after: Arc<RwLock<Option<(String, RunContext)>>>,
}

impl MockPassGenerator {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            generated: Arc::new(RwLock::new(Vec::new())),
            fail_for: Arc::new(RwLock::new(HashSet::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            cancel_after: Arc::new(RwLock::new(None)),
        }
    }

    /// Ticket IDs passed to `generate`, in call order.
    pub async fn generated(&self) -> Vec<String> {
        self.generated.read().await.clone()
    }

    /// Fail generation for `ticket_id` with a missing barcode error.
    pub async fn fail_for(&self, ticket_id: &str) {
        self.fail_for.write().await.insert(ticket_id.to_string());
    }

    /// Fail the next generation with `error`.
    pub async fn set_error(&self, error: GenerationError) {
        *self.next_error.write().await = Some(error);
    }

    /// Sleep before every generation.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Cancel `ctx` right after generating `ticket_id`.
    pub async fn cancel_after_generating(&self, ticket_id: &str, ctx: RunContext) {
        *self.cancel_after.write().await = Some((ticket_id.to_string(), ctx));
    }
}

#[async_trait]
impl PassGenerator for MockPassGenerator {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn generate(&self, ticket: &IssuedTicket) -> Result<WalletArtifact, GenerationError> {
        self.generated.write().await.push(ticket.id.clone());

        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if self.fail_for.read().await.contains(&ticket.id) {
            return Err(GenerationError::MissingField {
                ticket_id: ticket.id.clone(),
                field: "barcode",
            });
        }
        if let Some((id, ctx)) = self.cancel_after.read().await.as_ref() {
            if *id == ticket.id {
                ctx.cancel();
            }
        }

        Ok(WalletArtifact {
            platform: self.channel.platform().to_string(),
            file_name: format!("{}.mock", ticket.id),
            content_type: "application/octet-stream".to_string(),
            data: format!("mock:{}", ticket.id).into_bytes(),
        })
    }
}

/// PassSigner that records what it was asked to sign.
///
/// Returns `signed:<serial number>` instead of a real archive.
#[derive(Debug, Default)]
pub struct CapturingSigner {
    calls: Mutex<Vec<(Pass, PassTemplate)>>,
    next_error: Mutex<Option<GenerationError>>,
}

impl CapturingSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(pass, template)` pairs.
    pub async fn calls(&self) -> Vec<(Pass, PassTemplate)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Fail the next signing with `error`.
    pub async fn set_next_error(&self, error: GenerationError) {
        *self.next_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }
}

impl PassSigner for CapturingSigner {
    fn sign_and_zip(
        &self,
        pass: &Pass,
        template: &PassTemplate,
        _credentials: &SigningCredentials,
    ) -> Result<Vec<u8>, GenerationError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((pass.clone(), template.clone()));

        if let Some(error) = self
            .next_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            return Err(error);
        }
        Ok(format!("signed:{}", pass.serial_number).into_bytes())
    }
}

/// CredentialLoader that ignores paths and returns fixed credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentialLoader {
    credentials: SigningCredentials,
}

impl StaticCredentialLoader {
    pub fn new(credentials: SigningCredentials) -> Self {
        Self { credentials }
    }
}

impl CredentialLoader for StaticCredentialLoader {
    fn load(
        &self,
        _certificate_path: &Path,
        _password: &str,
        _root_certificate_path: &Path,
    ) -> Result<SigningCredentials, GenerationError> {
        Ok(self.credentials.clone())
    }
}
