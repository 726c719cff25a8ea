mod client;
mod transfer;

pub use client::{ListingParams, RawEntry, WsClient, WsError};
pub use transfer::{
    TransferClient, TransferConfig, TransferError, TransferProgress, UploadFields, UploadedFile,
};
