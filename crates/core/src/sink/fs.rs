//! Local filesystem sink.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::context::RunContext;
use crate::wallet::WalletArtifact;

use super::{validate_artifact, ArtifactSink, SinkError};

/// Writes artifacts under `<root>/<platform>/<file_name>`.
///
/// Platform directories are created on first use with mode 0755; artifact
/// files are owner read/write only.
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    root: PathBuf,
}

impl FsArtifactSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path an artifact is written to.
    pub fn path_for(&self, artifact: &WalletArtifact) -> PathBuf {
        self.root.join(&artifact.platform).join(&artifact.file_name)
    }

    async fn create_dir(dir: &Path) -> Result<(), SinkError> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);
        builder
            .create(dir)
            .await
            .map_err(|e| SinkError::io(dir, e))
    }

    async fn write_file(path: &Path, data: &[u8]) -> Result<(), SinkError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(path).await.map_err(|e| SinkError::io(path, e))?;
        file.write_all(data).await.map_err(|e| SinkError::io(path, e))?;
        file.flush().await.map_err(|e| SinkError::io(path, e))?;

        // `mode` only applies on create; tighten files left by older runs.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| SinkError::io(path, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactSink for FsArtifactSink {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn store(
        &self,
        artifact: &WalletArtifact,
        ctx: &RunContext,
    ) -> Result<String, SinkError> {
        validate_artifact(artifact)?;
        ctx.check()?;

        let dir = self.root.join(&artifact.platform);
        Self::create_dir(&dir).await?;

        let path = dir.join(&artifact.file_name);
        Self::write_file(&path, &artifact.data).await?;

        debug!(
            path = %path.display(),
            bytes = artifact.data.len(),
            "Stored artifact"
        );
        Ok(path.display().to_string())
    }
}
