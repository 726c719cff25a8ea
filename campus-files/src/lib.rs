mod cache;
mod error;
mod hash;
mod icons;
mod listing;
mod location;
mod paths;
mod service;

pub use campus_core::{
    ListingParams, RawEntry, TransferClient, TransferConfig, TransferError, TransferProgress,
    UploadedFile, WsClient, WsError,
};
pub use error::{DownloadError, DownloadStage, FilesError};
pub use hash::content_hash;
pub use icons::{FOLDER_ICON, GENERIC_FILE_ICON, icon_for_file};
pub use listing::{FileDescriptor, Listing, normalize};
pub use location::FileLocation;
pub use paths::{DownloadPath, PathError, normalize_file_name, resolve_download_path};
pub use service::{
    DownloadedFile, FilesService, MediaFile, SiteCapabilities, SiteContext, UploadOptions,
    UploadReceipt,
};
