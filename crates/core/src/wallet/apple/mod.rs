//! Apple Wallet signed passes.

mod attendee;
mod generator;
mod pass;
mod qr;
mod signer;
mod template;

pub use attendee::{
    apply_holder_name, resolve_holder_name, AttendeeFieldLocator, ExplicitFieldKey,
    FuzzyAttendeeLocator,
};
pub use generator::{ApplePassGenerator, PKPASS_CONTENT_TYPE};
pub use pass::{Barcode, Field, Pass, PassStructure, BARCODE_FORMAT_QR, BARCODE_MESSAGE_ENCODING};
pub use qr::{render_qr_png, DEFAULT_QR_SIZE};
pub use signer::{
    CredentialLoader, FileCredentialLoader, OpenSslPassSigner, PassSigner, SigningCredentials,
};
pub use template::{load_bundle, BundleTemplate, PassTemplate};
