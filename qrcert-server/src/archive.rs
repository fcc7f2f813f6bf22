//! Optional archival of uploaded images.
//!
//! When `UPLOAD_DIR` is set every upload is written there under a fresh UUID,
//! keeping the original extension when it is a plain alphanumeric one. Archival
//! never affects the verdict: failures are logged and the request proceeds.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::multipart::FileField;

/// Archive `file` into `dir`, returning the path written.
pub async fn archive_upload(dir: &Path, file: &FileField) -> Option<PathBuf> {
    let name = match extension(file.file_name.as_deref()) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    let path = dir.join(name);

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!(dir = %dir.display(), error = %e, "Failed to create upload directory");
        return None;
    }
    match tokio::fs::write(&path, &file.data).await {
        Ok(()) => {
            debug!(path = %path.display(), bytes = file.data.len(), "Upload archived");
            Some(path)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to archive upload");
            None
        }
    }
}

fn extension(file_name: Option<&str>) -> Option<String> {
    let ext = Path::new(file_name?).extension()?.to_str()?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}
