use std::path::{Path, PathBuf};
use std::time::Duration;

use campus_core::{ListingParams, TransferClient, TransferProgress, UploadFields, UploadedFile, WsClient};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::{
    ListingStore, listing_cache_key, my_files_key_prefix, site_files_key_prefix,
};
use crate::error::{DownloadError, FilesError};
use crate::listing::{FileDescriptor, Listing, normalize};
use crate::location::FileLocation;
use crate::paths::resolve_download_path;

/// Sources marked for post-upload removal are deleted after this delay so
/// the transfer machinery has settled before the file disappears.
const CLEANUP_DELAY: Duration = Duration::from_millis(500);

/// What the current connection is allowed to do, as reported by the site.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteCapabilities {
    pub list_files: bool,
    pub upload_files: bool,
    pub private_files: bool,
}

/// Everything the subsystem needs from the surrounding session, passed in
/// explicitly instead of read from globals.
#[derive(Clone)]
pub struct SiteContext {
    pub ws: WsClient,
    pub transfer: TransferClient,
    pub site_id: String,
    pub user_id: i64,
    pub storage_root: PathBuf,
    pub capabilities: SiteCapabilities,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub file_key: Option<String>,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub delete_after_upload: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub full_path: String,
}

/// Handle to content the download orchestrator has written locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
}

impl DownloadedFile {
    pub fn url(&self) -> Option<Url> {
        Url::from_file_path(&self.path).ok()
    }
}

#[derive(Clone)]
pub struct FilesService {
    ctx: SiteContext,
    cache: ListingStore,
}

impl FilesService {
    pub fn new(ctx: SiteContext) -> Self {
        Self {
            ctx,
            cache: ListingStore::default(),
        }
    }

    pub fn can_list_remote_files(&self) -> bool {
        self.ctx.capabilities.list_files
    }

    /// The feature is usable without the listing capability if uploads into
    /// the user's private area are still possible.
    pub fn is_feature_enabled(&self) -> bool {
        let caps = self.ctx.capabilities;
        caps.list_files || (caps.upload_files && caps.private_files)
    }

    /// List files under `params`, serving from cache when the key is warm.
    pub async fn list_files(&self, params: &ListingParams) -> Result<Listing, FilesError> {
        let key = listing_cache_key(params);
        if let Some(raw) = self.cache.get(&key).await {
            return normalize(&raw);
        }
        tracing::debug!(key = %key, "listing cache miss");
        let raw = self
            .ctx
            .ws
            .get_files(params)
            .await
            .map_err(FilesError::from_ws)?;
        self.cache.put(&key, raw.clone()).await;
        normalize(&raw)
    }

    pub async fn list_site_files(&self) -> Result<Listing, FilesError> {
        self.list_files(&ListingParams::default()).await
    }

    pub async fn list_my_files(&self) -> Result<Listing, FilesError> {
        self.list_files(&self.my_files_root_params()).await
    }

    /// Drop the cache entry for one directory. `path` is a serialized
    /// [`FileLocation`]; when empty, the canonical root for `root` is
    /// invalidated instead. Unrecognized roots and unparseable paths are
    /// silent no-ops: invalidation never fails outward.
    pub async fn invalidate_directory(&self, root: &str, path: &str) {
        let params = if path.is_empty() {
            match root {
                "site" => ListingParams::default(),
                "my" => self.my_files_root_params(),
                _ => return,
            }
        } else {
            match FileLocation::parse(path) {
                Some(location) => params_for_location(&location),
                None => return,
            }
        };
        self.cache.remove(&listing_cache_key(&params)).await;
    }

    pub async fn invalidate_my_files(&self) {
        self.cache.remove_prefix(&my_files_key_prefix()).await;
    }

    pub async fn invalidate_site_files(&self) {
        self.cache.remove_prefix(&site_files_key_prefix()).await;
    }

    /// Fetch a listed entry into the local store and return a handle to
    /// the written content. No internal retry; the stage that failed is
    /// carried in the error so the caller can decide.
    pub async fn download(&self, descriptor: &FileDescriptor) -> Result<DownloadedFile, FilesError> {
        let resolved =
            resolve_download_path(&self.ctx.site_id, &descriptor.link_id, &descriptor.file_name)?;
        let directory = self.ctx.storage_root.join(&resolved.directory);
        let target = self.ctx.storage_root.join(&resolved.file_path);

        let raw_url = descriptor
            .url
            .as_deref()
            .ok_or(FilesError::InvalidArgument("descriptor has no download url"))?;
        let url = self
            .ctx
            .ws
            .fix_pluginfile_url(raw_url)
            .map_err(|_| FilesError::InvalidArgument("descriptor url is not a valid url"))?;

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| DownloadError::Directory {
                path: directory.clone(),
                source,
            })?;

        self.ctx
            .transfer
            .download_to_path(url.as_str(), &target)
            .await
            .map_err(|source| DownloadError::Transfer {
                url: url.to_string(),
                source,
            })?;

        tracing::debug!(path = %target.display(), "download finished");
        Ok(DownloadedFile { path: target })
    }

    /// Upload a local resource. Progress notifications, if a sender is
    /// given, all arrive before this returns. When `delete_after_upload`
    /// is set the source is scheduled for removal whether the transfer
    /// succeeded or not; removal is best-effort and unordered with respect
    /// to the caller observing the result.
    pub async fn upload(
        &self,
        uri: &str,
        options: UploadOptions,
        progress: Option<UnboundedSender<TransferProgress>>,
    ) -> Result<UploadReceipt, FilesError> {
        let upload_url = self.ctx.ws.upload_url().map_err(FilesError::from_ws)?;
        let fields = UploadFields {
            file_key: options.file_key,
            file_name: options.file_name,
            mime_type: options.mime_type,
        };
        let result = self
            .ctx
            .transfer
            .upload_from_path(upload_url.as_str(), Path::new(uri), &fields, progress)
            .await;
        if options.delete_after_upload {
            schedule_cleanup(PathBuf::from(uri));
        }
        Ok(UploadReceipt { files: result? })
    }

    /// Upload a captured or picked image. Camera captures are temporary
    /// files, so they are cleaned up; album picks are not.
    pub async fn upload_image(
        &self,
        uri: &str,
        from_album: bool,
        progress: Option<UnboundedSender<TransferProgress>>,
    ) -> Result<UploadReceipt, FilesError> {
        if uri.is_empty() {
            return Err(FilesError::InvalidArgument("empty upload uri"));
        }
        let now_millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let options = UploadOptions {
            file_key: Some("file".to_string()),
            file_name: format!("image_{now_millis}.jpg"),
            mime_type: Some("image/jpeg".to_string()),
            delete_after_upload: !from_album,
        };
        self.upload(uri, options, progress).await
    }

    /// Upload a batch of recorded media, one independent task per file.
    /// One failing transfer does not cancel its siblings.
    pub fn upload_media(
        &self,
        files: Vec<MediaFile>,
    ) -> Vec<JoinHandle<Result<UploadReceipt, FilesError>>> {
        files
            .into_iter()
            .map(|media| {
                let service = self.clone();
                tokio::spawn(async move {
                    let options = UploadOptions {
                        file_key: None,
                        file_name: media.name,
                        mime_type: None,
                        delete_after_upload: true,
                    };
                    service.upload(&media.full_path, options, None).await
                })
            })
            .collect()
    }

    pub async fn upload_generic_file(
        &self,
        uri: &str,
        name: &str,
        mime_type: &str,
        progress: Option<UnboundedSender<TransferProgress>>,
    ) -> Result<UploadReceipt, FilesError> {
        let options = UploadOptions {
            file_key: None,
            file_name: name.to_string(),
            mime_type: Some(mime_type.to_string()),
            delete_after_upload: true,
        };
        self.upload(uri, options, progress).await
    }

    fn my_files_root_params(&self) -> ListingParams {
        ListingParams {
            contextid: -1,
            component: "user".to_string(),
            filearea: "private".to_string(),
            contextlevel: Some("user".to_string()),
            instanceid: Some(self.ctx.user_id),
            ..ListingParams::default()
        }
    }
}

fn params_for_location(location: &FileLocation) -> ListingParams {
    ListingParams {
        contextid: location.contextid,
        component: location.component.clone(),
        filearea: location.filearea.clone(),
        itemid: location.itemid,
        filepath: location.filepath.clone(),
        filename: location.filename.clone(),
        contextlevel: None,
        instanceid: None,
    }
}

fn schedule_cleanup(path: PathBuf) {
    tokio::spawn(async move {
        tokio::time::sleep(CLEANUP_DELAY).await;
        if let Err(err) = tokio::fs::remove_file(&path).await {
            tracing::debug!(path = %path.display(), %err, "post-upload cleanup skipped");
        }
    });
}
