use std::{
    env, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::io::ReaderStream;
use url::Url;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected upload response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("upload rejected by server: {message}")]
    Rejected { message: String },
    #[error("concurrency limiter is closed")]
    ConcurrencyClosed,
}

/// A single progress notification for a transfer in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub transferred: u64,
    pub total: Option<u64>,
}

/// Multipart shape of an upload. A missing `file_key` falls back to the
/// server's default part name.
#[derive(Debug, Clone, Default)]
pub struct UploadFields {
    pub file_key: Option<String>,
    pub file_name: String,
    pub mime_type: Option<String>,
}

/// One stored file as reported back by the upload endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UploadedFile {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub itemid: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadFault {
    error: String,
}

#[derive(Clone)]
pub struct TransferClient {
    http: Client,
    download_limit: Arc<Semaphore>,
    upload_limit: Arc<Semaphore>,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub download_concurrency: usize,
    pub upload_concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            download_concurrency: read_limit("CAMPUS_DOWNLOAD_CONCURRENCY", 4),
            upload_concurrency: read_limit("CAMPUS_UPLOAD_CONCURRENCY", 2),
        }
    }
}

impl TransferClient {
    pub fn new() -> Self {
        Self::with_config(TransferConfig::default())
    }

    pub fn with_config(config: TransferConfig) -> Self {
        Self {
            http: Client::new(),
            download_limit: Arc::new(Semaphore::new(config.download_concurrency.max(1))),
            upload_limit: Arc::new(Semaphore::new(config.upload_concurrency.max(1))),
        }
    }

    /// Stream `href` into `target`. The bytes land in a `.partial` sibling
    /// first and are renamed into place only once the stream is complete,
    /// so a failed transfer never leaves a readable file at `target`.
    pub async fn download_to_path(&self, href: &str, target: &Path) -> Result<(), TransferError> {
        let _permit = self
            .download_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransferError::ConcurrencyClosed)?;
        let url = Url::parse(href)?;
        tracing::debug!(url = %url, target = %target.display(), "starting download");
        let response = self.http.get(url).send().await?.error_for_status()?;

        let partial = partial_path(target);
        let result = write_stream(response, &partial, target).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }

    /// Post `source` as a multipart body to `href`, emitting one progress
    /// notification per chunk read. Every notification is sent before this
    /// method returns.
    pub async fn upload_from_path(
        &self,
        href: &str,
        source: &Path,
        fields: &UploadFields,
        progress: Option<UnboundedSender<TransferProgress>>,
    ) -> Result<Vec<UploadedFile>, TransferError> {
        let _permit = self
            .upload_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransferError::ConcurrencyClosed)?;
        let url = Url::parse(href)?;
        tracing::debug!(source = %source.display(), "starting upload");
        let total = tokio::fs::metadata(source).await?.len();
        let file = tokio::fs::File::open(source).await?;

        let mut transferred = 0u64;
        let stream = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                transferred += bytes.len() as u64;
                if let Some(progress) = &progress {
                    let _ = progress.send(TransferProgress {
                        transferred,
                        total: Some(total),
                    });
                }
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(fields.file_name.clone());
        let part = match &fields.mime_type {
            Some(mime) => part.mime_str(mime)?,
            None => part,
        };
        let part_name = fields.file_key.clone().unwrap_or_else(|| "file".to_string());
        let form = Form::new().part(part_name, part);

        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        // The endpoint reports faults as a 200 with an error object.
        let body: serde_json::Value = response.json().await?;
        if body.is_object() && body.get("error").is_some() {
            let fault: UploadFault = serde_json::from_value(body)?;
            return Err(TransferError::Rejected {
                message: fault.error,
            });
        }
        Ok(serde_json::from_value(body)?)
    }
}

impl Default for TransferClient {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_stream(
    response: reqwest::Response,
    partial: &Path,
    target: &Path,
) -> Result<(), TransferError> {
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    tokio::fs::rename(partial, target).await?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}

fn read_limit(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn downloads_file_to_target_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let client = TransferClient::new();

        client
            .download_to_path(&format!("{}/file", server.uri()), &target)
            .await
            .unwrap();

        assert_eq!(std::fs::read(target).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn failed_download_leaves_no_file_behind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let client = TransferClient::new();

        let err = client
            .download_to_path(&format!("{}/file", server.uri()), &target)
            .await
            .expect_err("expected download failure");

        assert!(matches!(err, TransferError::Request(_)));
        assert!(!target.exists());
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn upload_sends_multipart_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webservice/upload.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "filename": "in.bin", "itemid": 12, "url": "https://site.example/draft/in.bin" }
            ])))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = TransferClient::new();
        let fields = UploadFields {
            file_key: None,
            file_name: "in.bin".to_string(),
            mime_type: None,
        };
        let uploaded = client
            .upload_from_path(
                &format!("{}/webservice/upload.php", server.uri()),
                &source,
                &fields,
                Some(tx),
            )
            .await
            .unwrap();

        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].itemid, Some(12));

        // All notifications were sent before the call returned.
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(!events.is_empty());
        let last = events.last().unwrap();
        assert_eq!(last.transferred, 7);
        assert_eq!(last.total, Some(7));
    }

    #[tokio::test]
    async fn upload_fault_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webservice/upload.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "File too large",
                "errorcode": "maxbytes"
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("big.bin");
        std::fs::write(&source, b"oversized").unwrap();

        let client = TransferClient::new();
        let fields = UploadFields {
            file_key: Some("file".to_string()),
            file_name: "big.bin".to_string(),
            mime_type: None,
        };
        let err = client
            .upload_from_path(
                &format!("{}/webservice/upload.php", server.uri()),
                &source,
                &fields,
                None,
            )
            .await
            .expect_err("expected rejection");

        assert!(matches!(err, TransferError::Rejected { .. }));
    }
}
