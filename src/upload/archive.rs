use super::Uploader;
use crate::error::UploadError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Uploader that files artifacts into a local archive directory.
///
/// Each upload gets a fresh v4 UUID and is stored as `<archive>/<id>/<name>`.
#[derive(Debug, Clone)]
pub struct LocalArchiveUploader {
    archive_dir: PathBuf,
}

impl LocalArchiveUploader {
    pub fn new<P: Into<PathBuf>>(archive_dir: P) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Where an artifact with this id and name is stored
    pub fn artifact_path(&self, artifact_id: &str, name: &str) -> PathBuf {
        self.archive_dir.join(artifact_id).join(name)
    }
}

#[async_trait::async_trait]
impl Uploader for LocalArchiveUploader {
    async fn upload(&self, path: &Path, name: &str) -> Result<String, UploadError> {
        let failure = |details: String| UploadError::UpstreamUploadFailure {
            path: path.to_path_buf(),
            details,
        };

        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(failure(format!("invalid artifact name '{}'", name)));
        }

        let artifact_id = Uuid::new_v4().simple().to_string();
        let target = self.artifact_path(&artifact_id, name);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| failure(format!("cannot create {}: {}", parent.display(), e)))?;
        }

        let bytes = fs::copy(path, &target)
            .await
            .map_err(|e| failure(e.to_string()))?;

        debug!("Copied {} bytes to {}", bytes, target.display());
        info!("Archived {} as {}", path.display(), artifact_id);
        Ok(artifact_id)
    }

    fn uploader_name(&self) -> &str {
        "local_archive"
    }
}
