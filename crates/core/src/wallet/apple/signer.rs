//! Signing and packaging of `.pkpass` archives.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;

use openssl::pkcs12::Pkcs12;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::X509;
use sha1::{Digest, Sha1};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::wallet::GenerationError;

use super::pass::Pass;
use super::template::{PassTemplate, MANIFEST_FILE, PASS_FILE, SIGNATURE_FILE};

/// Certificate, key and trusted root used to sign passes.
#[derive(Clone)]
pub struct SigningCredentials {
    pub certificate: X509,
    pub private_key: PKey<Private>,
    /// Apple WWDR intermediate embedded in the signature.
    pub root: X509,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("certificate", &self.certificate.subject_name())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Loads signing credentials.
pub trait CredentialLoader: Send + Sync {
    fn load(
        &self,
        certificate_path: &Path,
        password: &str,
        root_certificate_path: &Path,
    ) -> Result<SigningCredentials, GenerationError>;
}

/// Signs a pass and zips it with its template into a `.pkpass`.
pub trait PassSigner: Send + Sync {
    fn sign_and_zip(
        &self,
        pass: &Pass,
        template: &PassTemplate,
        credentials: &SigningCredentials,
    ) -> Result<Vec<u8>, GenerationError>;
}

/// Reads a PKCS#12 bundle and a DER or PEM root certificate from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCredentialLoader;

impl CredentialLoader for FileCredentialLoader {
    fn load(
        &self,
        certificate_path: &Path,
        password: &str,
        root_certificate_path: &Path,
    ) -> Result<SigningCredentials, GenerationError> {
        let p12 = std::fs::read(certificate_path).map_err(|e| {
            GenerationError::Credentials(format!("reading {}: {}", certificate_path.display(), e))
        })?;
        let parsed = Pkcs12::from_der(&p12)
            .and_then(|p| p.parse2(password))
            .map_err(|e| GenerationError::Credentials(format!("parsing PKCS#12: {}", e)))?;

        let certificate = parsed.cert.ok_or_else(|| {
            GenerationError::Credentials("PKCS#12 bundle has no certificate".to_string())
        })?;
        let private_key = parsed.pkey.ok_or_else(|| {
            GenerationError::Credentials("PKCS#12 bundle has no private key".to_string())
        })?;

        let root_bytes = std::fs::read(root_certificate_path).map_err(|e| {
            GenerationError::Credentials(format!(
                "reading {}: {}",
                root_certificate_path.display(),
                e
            ))
        })?;
        let root = parse_certificate(&root_bytes)?;

        Ok(SigningCredentials {
            certificate,
            private_key,
            root,
        })
    }
}

fn parse_certificate(bytes: &[u8]) -> Result<X509, GenerationError> {
    let parsed = if bytes.starts_with(b"-----BEGIN") {
        X509::from_pem(bytes)
    } else {
        X509::from_der(bytes)
    };
    parsed.map_err(|e| GenerationError::Credentials(format!("parsing root certificate: {}", e)))
}

/// PKCS#7 detached signature over `manifest.json`, archived with zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSslPassSigner;

impl OpenSslPassSigner {
    /// `manifest.json`: SHA-1 hex digest of every archived file.
    fn manifest(files: &BTreeMap<&str, &[u8]>) -> Result<Vec<u8>, GenerationError> {
        let digests: BTreeMap<&str, String> = files
            .iter()
            .map(|(name, data)| (*name, hex(&Sha1::digest(data))))
            .collect();
        serde_json::to_vec_pretty(&digests)
            .map_err(|e| GenerationError::Encoding(format!("manifest: {}", e)))
    }

    fn sign_manifest(
        manifest: &[u8],
        credentials: &SigningCredentials,
    ) -> Result<Vec<u8>, GenerationError> {
        let sign_err = |e: openssl::error::ErrorStack| GenerationError::Signing(e.to_string());

        let mut chain = Stack::new().map_err(sign_err)?;
        chain.push(credentials.root.clone()).map_err(sign_err)?;

        Pkcs7::sign(
            &credentials.certificate,
            &credentials.private_key,
            &chain,
            manifest,
            Pkcs7Flags::BINARY | Pkcs7Flags::DETACHED,
        )
        .and_then(|p| p.to_der())
        .map_err(sign_err)
    }
}

impl PassSigner for OpenSslPassSigner {
    fn sign_and_zip(
        &self,
        pass: &Pass,
        template: &PassTemplate,
        credentials: &SigningCredentials,
    ) -> Result<Vec<u8>, GenerationError> {
        let pass_json = pass
            .to_json()
            .map_err(|e| GenerationError::Encoding(format!("pass.json: {}", e)))?;

        let mut files: BTreeMap<&str, &[u8]> = template
            .files()
            .filter(|(name, _)| ![PASS_FILE, MANIFEST_FILE, SIGNATURE_FILE].contains(name))
            .collect();
        files.insert(PASS_FILE, &pass_json);

        let manifest = Self::manifest(&files)?;
        let signature = Self::sign_manifest(&manifest, credentials)?;

        let zip_err = |e: zip::result::ZipError| GenerationError::Encoding(format!("zip: {}", e));
        let io_err = |e: std::io::Error| GenerationError::Encoding(format!("zip: {}", e));

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files
            .iter()
            .map(|(n, d)| (*n, *d))
            .chain([(MANIFEST_FILE, manifest.as_slice()), (SIGNATURE_FILE, signature.as_slice())])
        {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.start_file(name, options).map_err(zip_err)?;
            writer.write_all(data).map_err(io_err)?;
        }

        Ok(writer.finish().map_err(zip_err)?.into_inner())
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use std::io::Read;

    fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut file = archive.by_name(name).unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_archive_contains_manifest_and_valid_signature() {
        let credentials = fixtures::signing_credentials();
        let mut template = PassTemplate::new();
        template.add_file("icon.png", b"icon".to_vec());
        template.add_file(SIGNATURE_FILE, b"stale".to_vec());

        let mut pass = Pass::new();
        pass.serial_number = "it_1".to_string();

        let bytes = OpenSslPassSigner
            .sign_and_zip(&pass, &template, &credentials)
            .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["icon.png", "manifest.json", "pass.json", "signature"]);

        let pass_json = read_entry(&mut archive, PASS_FILE);
        let manifest = read_entry(&mut archive, MANIFEST_FILE);
        let digests: BTreeMap<String, String> = serde_json::from_slice(&manifest).unwrap();
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[PASS_FILE], hex(&Sha1::digest(&pass_json)));
        assert_eq!(digests["icon.png"], hex(&Sha1::digest(b"icon")));

        let signature = read_entry(&mut archive, SIGNATURE_FILE);
        assert_ne!(signature, b"stale");
        let pkcs7 = Pkcs7::from_der(&signature).unwrap();

        let certs: Stack<X509> = Stack::new().unwrap();
        let store = openssl::x509::store::X509StoreBuilder::new().unwrap().build();
        pkcs7
            .verify(
                &certs,
                &store,
                Some(manifest.as_slice()),
                None,
                Pkcs7Flags::BINARY | Pkcs7Flags::NOVERIFY,
            )
            .unwrap();
    }

    #[test]
    fn test_file_loader_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = fixtures::signing_credentials();

        let p12 = Pkcs12::builder()
            .name("pass")
            .pkey(&credentials.private_key)
            .cert(&credentials.certificate)
            .build2("secret")
            .unwrap()
            .to_der()
            .unwrap();
        let cert_path = dir.path().join("pass.p12");
        let root_path = dir.path().join("wwdr.pem");
        std::fs::write(&cert_path, p12).unwrap();
        std::fs::write(&root_path, credentials.root.to_pem().unwrap()).unwrap();

        let loaded = FileCredentialLoader
            .load(&cert_path, "secret", &root_path)
            .unwrap();
        assert_eq!(
            loaded.certificate.to_der().unwrap(),
            credentials.certificate.to_der().unwrap()
        );

        let err = FileCredentialLoader
            .load(&cert_path, "wrong", &root_path)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Credentials(_)));
    }

    #[test]
    fn test_missing_certificate_file() {
        let err = FileCredentialLoader
            .load(Path::new("/nonexistent.p12"), "", Path::new("/nonexistent.cer"))
            .unwrap_err();
        assert!(matches!(err, GenerationError::Credentials(_)));
    }
}
