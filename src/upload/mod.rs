mod archive;

pub use archive::LocalArchiveUploader;

use crate::error::UploadError;
use std::path::Path;

/// Remote storage for exported datasets.
///
/// Given a local file and a logical name, stores the file and returns an opaque identifier.
#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path, name: &str) -> Result<String, UploadError>;

    /// Name used in logs and events
    fn uploader_name(&self) -> &str;
}

/// Build the viewer reference for an uploaded artifact from a `{id}` template
pub fn viewer_url(template: &str, artifact_id: &str) -> String {
    template.replace("{id}", artifact_id)
}
