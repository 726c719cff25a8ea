use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("site id is empty")]
    EmptySiteId,
    #[error("group id is empty")]
    EmptyGroupId,
}

/// Local landing spot for one downloaded entry, relative to the storage
/// root: all content sharing a group id lands in one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPath {
    pub directory: PathBuf,
    pub file_path: PathBuf,
}

pub fn resolve_download_path(
    site_id: &str,
    group_id: &str,
    file_name: &str,
) -> Result<DownloadPath, PathError> {
    if site_id.is_empty() {
        return Err(PathError::EmptySiteId);
    }
    if group_id.is_empty() {
        return Err(PathError::EmptyGroupId);
    }
    let directory = PathBuf::from(site_id).join("files").join(group_id);
    let file_path = directory.join(normalize_file_name(file_name));
    Ok(DownloadPath {
        directory,
        file_path,
    })
}

/// Strip characters that are illegal on common filesystems. Idempotent:
/// the output never contains a character the filter would remove.
pub fn normalize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') && !c.is_control())
        .collect()
}
