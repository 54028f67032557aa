//! Certificate bootstrap.
//!
//! Deployments that cannot mount files pass the PKCS#12 bundle and the root
//! certificate as base64. They are decoded once at startup into a private
//! runtime directory so the signer can keep working with paths.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;
use tracing::info;

use crate::config::AppleWalletConfig;

const SIGNING_CERT_FILE: &str = "apple-signing.p12";
const ROOT_CERT_FILE: &str = "apple-root.cer";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("either apple.{0}_path or apple.{0}_base64 must be set")]
    Missing(&'static str),

    #[error("failed to decode base64 {name}: {source}")]
    Decode {
        name: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Return a copy of `config` whose certificate paths point at real files.
///
/// Configured paths are kept as is. Missing paths are filled by decoding the
/// matching base64 field into `certificate_runtime_dir` (mode 0700, files 0600).
pub fn materialize_certificates(
    config: &AppleWalletConfig,
) -> Result<AppleWalletConfig, CertificateError> {
    let mut next = config.clone();

    if next.certificate_path.is_none() {
        let encoded = config
            .certificate_base64
            .as_deref()
            .ok_or(CertificateError::Missing("certificate"))?;
        next.certificate_path = Some(decode_into(
            &config.certificate_runtime_dir,
            SIGNING_CERT_FILE,
            "certificate",
            encoded,
        )?);
    }

    if next.root_certificate_path.is_none() {
        let encoded = config
            .root_certificate_base64
            .as_deref()
            .ok_or(CertificateError::Missing("root_certificate"))?;
        next.root_certificate_path = Some(decode_into(
            &config.certificate_runtime_dir,
            ROOT_CERT_FILE,
            "root_certificate",
            encoded,
        )?);
    }

    Ok(next)
}

fn decode_into(
    dir: &Path,
    file_name: &str,
    name: &'static str,
    encoded: &str,
) -> Result<PathBuf, CertificateError> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|source| CertificateError::Decode { name, source })?;

    create_private_dir(dir).map_err(|source| CertificateError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(file_name);
    write_private_file(&path, &data).map_err(|source| CertificateError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), "Materialized certificate from base64");
    Ok(path)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)
}
