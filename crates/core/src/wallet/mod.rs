//! Wallet pass generation.
//!
//! Each generator turns one issued ticket into one [`WalletArtifact`] for its
//! channel. Signing material is bootstrapped by [`materialize_certificates`].

pub mod apple;
mod certs;
pub mod google;
mod types;

pub use apple::ApplePassGenerator;
pub use certs::{materialize_certificates, CertificateError};
pub use google::GoogleObjectGenerator;
pub use types::{GenerationError, PassGenerator, WalletArtifact};
