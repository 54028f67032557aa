//! Testing utilities and mock implementations.
//!
//! Every collaborator trait of the sync orchestrator has a mock here, so runs
//! can be exercised end to end without Ticket Tailor, signing certificates,
//! SMTP or object storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use tailorpass_core::testing::{fixtures, MockPassGenerator, MockTicketSource};
//!
//! let source = MockTicketSource::new();
//! source.set_pages(vec![vec![fixtures::issued_ticket("it_1")]]).await;
//!
//! let generator = MockPassGenerator::new(Channel::AppleWallet);
//! generator.fail_for("it_1").await;
//! ```

mod mock_delivery;
mod mock_sink;
mod mock_source;
mod mock_store;
mod mock_wallet;

pub use mock_delivery::{MockDelivery, MockMailSender};
pub use mock_sink::{InMemoryObjectStore, MockArtifactSink, StoredObject};
pub use mock_source::MockTicketSource;
pub use mock_store::MockProductionStore;
pub use mock_wallet::{CapturingSigner, MockPassGenerator, StaticCredentialLoader};

/// Test fixtures and helper functions.
pub mod fixtures {
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::error::ErrorStack;
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::{X509Builder, X509NameBuilder, X509NameRef, X509};

    use crate::source::{IssuedTicket, ListedCurrency};
    use crate::wallet::apple::SigningCredentials;

    /// A valid issued ticket for Nala Pride with reasonable defaults.
    pub fn issued_ticket(id: &str) -> IssuedTicket {
        IssuedTicket {
            object: "issued_ticket".to_string(),
            id: id.to_string(),
            barcode: format!("BR-{}", id),
            barcode_url: format!("https://cdn.tickettailor.test/barcodes/{}.png", id),
            checked_in: "false".to_string(),
            created_at: 1_717_200_000,
            description: "Hakuna Sunset".to_string(),
            email: "nala@example.com".to_string(),
            event_id: "ev_1".to_string(),
            event_series_id: "es_1".to_string(),
            first_name: "Nala".to_string(),
            full_name: "Nala Pride".to_string(),
            last_name: "Pride".to_string(),
            listed_currency: ListedCurrency {
                base_multiplier: 100,
                code: "gbp".to_string(),
            },
            listed_price: 2500,
            order_id: format!("or_{}", id),
            qr_code_url: format!("https://cdn.tickettailor.test/qr/{}.png", id),
            source: "checkout".to_string(),
            status: "valid".to_string(),
            ticket_type_id: "tt_general".to_string(),
            updated_at: 1_717_200_000,
            ..Default::default()
        }
    }

    /// Several tickets with IDs `<prefix>1..=count`.
    pub fn issued_tickets(prefix: &str, count: usize) -> Vec<IssuedTicket> {
        (1..=count)
            .map(|i| issued_ticket(&format!("{}{}", prefix, i)))
            .collect()
    }

    /// Freshly generated P-256 signing certificate issued by a separate root.
    ///
    /// Panics if openssl cannot generate keys, which only happens on a broken
    /// installation.
    pub fn signing_credentials() -> SigningCredentials {
        build_credentials().expect("generate test signing credentials")
    }

    fn build_credentials() -> Result<SigningCredentials, ErrorStack> {
        let root_key = ec_key()?;
        let root = certificate("Test WWDR Root", &root_key, None)?;
        let private_key = ec_key()?;
        let certificate = certificate(
            "Pass Type ID: pass.com.hakuna.events",
            &private_key,
            Some((root.subject_name(), &root_key)),
        )?;
        Ok(SigningCredentials {
            certificate,
            private_key,
            root,
        })
    }

    fn ec_key() -> Result<PKey<Private>, ErrorStack> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
        PKey::from_ec_key(EcKey::generate(&group)?)
    }

    fn certificate(
        common_name: &str,
        key: &PKey<Private>,
        issuer: Option<(&X509NameRef, &PKey<Private>)>,
    ) -> Result<X509, ErrorStack> {
        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
        let name = name.build();

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let serial = BigNum::from_u32(1)?.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_pubkey(key)?;
        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(365)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;

        let (issuer_name, signing_key): (&X509NameRef, &PKey<Private>) = match issuer {
            Some(issuer) => issuer,
            None => (&name, key),
        };
        builder.set_issuer_name(issuer_name)?;
        builder.sign(signing_key, MessageDigest::sha256())?;
        Ok(builder.build())
    }

}
