use std::io;
use std::path::PathBuf;

use campus_core::{TransferError, WsError};
use thiserror::Error;

use crate::paths::PathError;

/// Which step of a download rejected the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Directory,
    Transfer,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("transfer from {url} failed: {source}")]
    Transfer {
        url: String,
        #[source]
        source: TransferError,
    },
}

impl DownloadError {
    pub fn stage(&self) -> DownloadStage {
        match self {
            DownloadError::Directory { .. } => DownloadStage::Directory,
            DownloadError::Transfer { .. } => DownloadStage::Transfer,
        }
    }
}

#[derive(Debug, Error)]
pub enum FilesError {
    #[error("invalid location: {0}")]
    InvalidLocation(#[from] PathError),
    #[error("file service unreachable: {0}")]
    RemoteUnavailable(#[source] WsError),
    #[error("listing response is missing the files collection")]
    MissingFiles,
    #[error("listing entry is missing its isdir or filename field")]
    MalformedEntry,
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("upload failed: {0}")]
    Upload(#[from] TransferError),
}

impl FilesError {
    pub(crate) fn from_ws(err: WsError) -> Self {
        match err {
            WsError::MissingFiles => FilesError::MissingFiles,
            other => FilesError::RemoteUnavailable(other),
        }
    }
}
