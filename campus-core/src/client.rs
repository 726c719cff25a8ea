use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

const REST_SERVER_PATH: &str = "/webservice/rest/server.php";
const UPLOAD_PATH: &str = "/webservice/upload.php";
const GET_FILES_FUNCTION: &str = "core_files_get_files";

#[derive(Debug, Error)]
pub enum WsError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("service returned {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("web service fault {errorcode}: {message}")]
    Ws { errorcode: String, message: String },
    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("listing response is missing the files collection")]
    MissingFiles,
}

/// Parameters of the remote file-listing call. The six location fields
/// address a directory; `contextlevel`/`instanceid` are only set for the
/// private-files root, which is addressed by user rather than by context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingParams {
    pub contextid: i64,
    pub component: String,
    pub filearea: String,
    pub itemid: i64,
    pub filepath: String,
    pub filename: String,
    pub contextlevel: Option<String>,
    pub instanceid: Option<i64>,
}

impl ListingParams {
    fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("contextid", self.contextid.to_string()),
            ("component", self.component.clone()),
            ("filearea", self.filearea.clone()),
            ("itemid", self.itemid.to_string()),
            ("filepath", self.filepath.clone()),
            ("filename", self.filename.clone()),
        ];
        if let Some(contextlevel) = &self.contextlevel {
            form.push(("contextlevel", contextlevel.clone()));
        }
        if let Some(instanceid) = self.instanceid {
            form.push(("instanceid", instanceid.to_string()));
        }
        form
    }
}

/// One entry of a raw listing response. Every field is optional on the
/// wire; the listing layer decides which absences are tolerable.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawEntry {
    #[serde(default)]
    pub contextid: Option<i64>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub filearea: Option<String>,
    #[serde(default)]
    pub itemid: Option<i64>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub isdir: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filesize: Option<i64>,
    #[serde(default)]
    pub timemodified: Option<i64>,
    #[serde(default)]
    pub timecreated: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    files: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct WsFault {
    errorcode: String,
    message: String,
}

#[derive(Clone)]
pub struct WsClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl WsClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, WsError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    pub async fn get_files(&self, params: &ListingParams) -> Result<Vec<RawEntry>, WsError> {
        let response: ListingResponse = self.call(GET_FILES_FUNCTION, params.to_form()).await?;
        response.files.ok_or(WsError::MissingFiles)
    }

    /// Endpoint the raw transfer client posts uploads to. The token rides
    /// in the query string because the upload endpoint is not a REST
    /// function.
    pub fn upload_url(&self) -> Result<Url, WsError> {
        let mut url = self.base_url.join(UPLOAD_PATH)?;
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }

    /// Rewrite a served-file url so it is fetchable with the web-service
    /// token instead of a browser session: `/pluginfile.php/...` becomes
    /// `/webservice/pluginfile.php/...?token=...`. Urls that do not point
    /// at the plugin-file handler pass through untouched.
    pub fn fix_pluginfile_url(&self, raw: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(raw)?;
        let path = url.path();
        if path.contains("/pluginfile.php") && !path.contains("/webservice/pluginfile.php") {
            let rewritten = path.replacen("/pluginfile.php", "/webservice/pluginfile.php", 1);
            url.set_path(&rewritten);
            url.query_pairs_mut().append_pair("token", &self.token);
        }
        Ok(url)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        mut form: Vec<(&'static str, String)>,
    ) -> Result<T, WsError> {
        form.push(("wstoken", self.token.clone()));
        form.push(("wsfunction", function.to_string()));
        form.push(("moodlewsrestformat", "json".to_string()));

        let url = self.base_url.join(REST_SERVER_PATH)?;
        let response = self.http.post(url).form(&form).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WsError::Http { status, body });
        }

        // Faults come back with a 200 status and an exception body.
        let body: serde_json::Value = response.json().await?;
        if body.get("exception").is_some() {
            let fault: WsFault = serde_json::from_value(body)?;
            return Err(WsError::Ws {
                errorcode: fault.errorcode,
                message: fault.message,
            });
        }
        Ok(serde_json::from_value(body)?)
    }
}
