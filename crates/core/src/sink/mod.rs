//! Artifact sink: where generated wallet artifacts are written.
//!
//! Artifacts are namespaced by platform: `<root>/<platform>/<file_name>` on
//! disk or `<prefix>/<platform>/<file_name>` in object storage.

mod fs;
mod object;
mod s3;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::{Cancelled, RunContext};
use crate::wallet::WalletArtifact;

pub use fs::FsArtifactSink;
pub use object::{object_key, ObjectStore, ObjectStoreSink};
pub use s3::S3ObjectStore;

/// Errors from storing artifacts.
#[derive(Debug, Error)]
pub enum SinkError {
    /// File name or platform cannot be used as a path component.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Object storage rejected the operation.
    #[error("object store error for key {key}: {message}")]
    ObjectStore { key: String, message: String },
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SinkError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Destination for generated artifacts.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    fn name(&self) -> &str;

    /// Write `artifact` and return where it can be found.
    ///
    /// Storing the same file name again replaces the earlier bytes.
    async fn store(&self, artifact: &WalletArtifact, ctx: &RunContext)
        -> Result<String, SinkError>;
}

/// Reject names that are empty or would escape the platform directory.
pub(crate) fn validate_artifact(artifact: &WalletArtifact) -> Result<(), SinkError> {
    if artifact.file_name.trim().is_empty() {
        return Err(SinkError::InvalidArtifact("file name is empty".to_string()));
    }
    if artifact.platform.trim().is_empty() {
        return Err(SinkError::InvalidArtifact("platform is empty".to_string()));
    }
    for (what, value) in [("file name", &artifact.file_name), ("platform", &artifact.platform)] {
        if value.contains('/') || value.contains('\\') || value == ".." || value == "." {
            return Err(SinkError::InvalidArtifact(format!(
                "{} {:?} is not a plain path component",
                what, value
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(platform: &str, file_name: &str) -> WalletArtifact {
        WalletArtifact {
            platform: platform.to_string(),
            file_name: file_name.to_string(),
            content_type: "application/json".to_string(),
            data: b"{}".to_vec(),
        }
    }

    #[test]
    fn test_validate_artifact() {
        assert!(validate_artifact(&artifact("apple", "it_1.pkpass")).is_ok());
        assert!(validate_artifact(&artifact("apple", "")).is_err());
        assert!(validate_artifact(&artifact("", "it_1.json")).is_err());
        assert!(validate_artifact(&artifact("apple", "../it_1.json")).is_err());
        assert!(validate_artifact(&artifact("apple", "..")).is_err());
        assert!(validate_artifact(&artifact("a\\b", "it_1.json")).is_err());
    }
}
