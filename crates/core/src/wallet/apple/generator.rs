//! Signed pass generator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{AppleWalletConfig, TemplateMode};
use crate::source::IssuedTicket;
use crate::store::Channel;
use crate::wallet::{GenerationError, PassGenerator, WalletArtifact};

use super::attendee::{
    apply_holder_name, resolve_holder_name, AttendeeFieldLocator, ExplicitFieldKey,
    FuzzyAttendeeLocator,
};
use super::pass::{Barcode, Field, Pass, PassStructure};
use super::qr::render_qr_png;
use super::signer::{CredentialLoader, FileCredentialLoader, OpenSslPassSigner, PassSigner};
use super::template::{
    load_bundle, minimal_icon, BundleTemplate, PassTemplate, ICON_FILE, THUMBNAIL_FILE,
};

pub const PKPASS_CONTENT_TYPE: &str = "application/vnd.apple.pkpass";

/// Where the pass layout comes from.
enum TemplateKind {
    /// Programmatic event ticket with a generated icon.
    Minimal { icon: Vec<u8> },
    /// Designer bundle loaded once at construction.
    Bundle(BundleTemplate),
}

/// Produces signed `.pkpass` archives.
pub struct ApplePassGenerator {
    config: AppleWalletConfig,
    template: TemplateKind,
    locator: Box<dyn AttendeeFieldLocator>,
    loader: Arc<dyn CredentialLoader>,
    signer: Arc<dyn PassSigner>,
}

impl ApplePassGenerator {
    /// Create a generator that signs with openssl from the configured files.
    pub fn new(config: AppleWalletConfig) -> Result<Self, GenerationError> {
        Self::with_collaborators(
            config,
            Arc::new(FileCredentialLoader),
            Arc::new(OpenSslPassSigner),
        )
    }

    /// Create a generator with custom credential loading and signing.
    pub fn with_collaborators(
        config: AppleWalletConfig,
        loader: Arc<dyn CredentialLoader>,
        signer: Arc<dyn PassSigner>,
    ) -> Result<Self, GenerationError> {
        for (name, value) in [
            ("pass_type_identifier", &config.pass_type_identifier),
            ("team_identifier", &config.team_identifier),
        ] {
            if value.trim().is_empty() {
                return Err(GenerationError::InvalidConfig(format!(
                    "apple.{} is required",
                    name
                )));
            }
        }
        if config.certificate_path.is_none() || config.root_certificate_path.is_none() {
            return Err(GenerationError::InvalidConfig(
                "apple certificate and root certificate paths are required".to_string(),
            ));
        }

        let template = match config.template {
            TemplateMode::Minimal => TemplateKind::Minimal {
                icon: minimal_icon()?,
            },
            TemplateMode::Bundle => {
                let dir = config.template_dir.as_deref().ok_or_else(|| {
                    GenerationError::InvalidConfig(
                        "apple.template_dir is required for bundle templates".to_string(),
                    )
                })?;
                TemplateKind::Bundle(load_bundle(dir)?)
            }
        };

        let locator: Box<dyn AttendeeFieldLocator> = match &config.attendee_field_key {
            Some(key) => Box::new(ExplicitFieldKey(key.clone())),
            None => Box::new(FuzzyAttendeeLocator),
        };

        Ok(Self {
            config,
            template,
            locator,
            loader,
            signer,
        })
    }

    /// Replace the attendee field strategy.
    pub fn with_locator(mut self, locator: Box<dyn AttendeeFieldLocator>) -> Self {
        self.locator = locator;
        self
    }

    fn apply_identity(&self, pass: &mut Pass, ticket: &IssuedTicket) {
        pass.pass_type_identifier = self.config.pass_type_identifier.clone();
        pass.team_identifier = self.config.team_identifier.clone();
        pass.organization_name = self.config.organization_name.clone();
        pass.description = self.config.description.clone();
        pass.logo_text = Some(self.config.logo_text.clone()).filter(|t| !t.is_empty());
        pass.serial_number = ticket.id.clone();
    }

    fn build_minimal(
        &self,
        ticket: &IssuedTicket,
        holder: &str,
        icon: &[u8],
        qr: Vec<u8>,
    ) -> (Pass, PassTemplate) {
        let mut pass = Pass::new();
        self.apply_identity(&mut pass, ticket);
        pass.barcodes.push(Barcode::qr(&ticket.barcode));
        pass.event_ticket = Some(PassStructure {
            primary_fields: vec![Field::new("event", "Event", ticket.description.as_str())],
            secondary_fields: vec![Field::new("name", "Name", holder)],
            ..Default::default()
        });

        let mut template = PassTemplate::new();
        template.add_file(ICON_FILE, icon.to_vec());
        template.add_file(THUMBNAIL_FILE, qr);
        (pass, template)
    }

    fn build_from_bundle(
        &self,
        ticket: &IssuedTicket,
        holder: &str,
        bundle: &BundleTemplate,
        qr: Vec<u8>,
    ) -> Result<(Pass, PassTemplate), GenerationError> {
        let mut pass = bundle.pass.clone();
        self.apply_identity(&mut pass, ticket);

        let code = ticket.barcode.trim();
        if pass.barcodes.is_empty() {
            pass.barcodes.push(Barcode::default());
        }
        let barcode = &mut pass.barcodes[0];
        barcode.format = super::pass::BARCODE_FORMAT_QR.to_string();
        barcode.message = code.to_string();
        barcode.message_encoding = super::pass::BARCODE_MESSAGE_ENCODING.to_string();
        barcode.alt_text = Some(code.to_string());

        apply_holder_name(&mut pass, holder, self.locator.as_ref())?;

        let mut template = bundle.assets.clone();
        if !template.contains(THUMBNAIL_FILE) {
            template.add_file(THUMBNAIL_FILE, qr);
        }
        Ok((pass, template))
    }
}

#[async_trait]
impl PassGenerator for ApplePassGenerator {
    fn channel(&self) -> Channel {
        Channel::AppleWallet
    }

    async fn generate(&self, ticket: &IssuedTicket) -> Result<WalletArtifact, GenerationError> {
        debug!(ticket_id = %ticket.id, "Creating apple wallet pass");

        if ticket.id.trim().is_empty() {
            return Err(GenerationError::missing(ticket, "id"));
        }
        if ticket.barcode.trim().is_empty() {
            return Err(GenerationError::missing(ticket, "barcode"));
        }
        let holder = resolve_holder_name(ticket)?;

        debug!(ticket_id = %ticket.id, qr_size = self.config.qr_size, "Generating pass QR code");
        let qr = render_qr_png(&ticket.barcode, self.config.qr_size)?;

        let (pass, template) = match &self.template {
            TemplateKind::Minimal { icon } => self.build_minimal(ticket, &holder, icon, qr),
            TemplateKind::Bundle(bundle) => self.build_from_bundle(ticket, &holder, bundle, qr)?,
        };

        // Both paths were checked at construction.
        let (Some(cert), Some(root)) = (
            self.config.certificate_path.as_deref(),
            self.config.root_certificate_path.as_deref(),
        ) else {
            return Err(GenerationError::InvalidConfig(
                "apple certificate paths are not set".to_string(),
            ));
        };

        debug!(certificate = %cert.display(), "Loading signing credentials");
        let credentials = self
            .loader
            .load(cert, &self.config.certificate_password, root)?;

        let data = self.signer.sign_and_zip(&pass, &template, &credentials)?;
        debug!(ticket_id = %ticket.id, bytes = data.len(), "Signed apple wallet pass");

        Ok(WalletArtifact {
            platform: Channel::AppleWallet.platform().to_string(),
            file_name: format!("{}.pkpass", ticket.id),
            content_type: PKPASS_CONTENT_TYPE.to_string(),
            data,
        })
    }
}
