//! Intercom API adapter: reporting export jobs, admin directory,
//! per-conversation detail, and export payload decoding.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;

pub mod admins;
pub mod conversations;
pub mod csv;
pub mod export;
pub mod normalize;

pub use conversations::ConversationDetail;
pub use csv::RawRow;
pub use export::{ExportJob, PollConfig};

pub const CRATE_NAME: &str = "cxsync-intercom";

pub const DEFAULT_BASE_URL: &str = "https://api.intercom.io";
pub const API_VERSION: &str = "2.14";

#[derive(Debug, Error)]
pub enum IntercomError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("enqueue response carried no job identifier")]
    MissingJobId,
    #[error("export job {job_id} reported terminal status {status:?}")]
    JobFailed { job_id: String, status: String },
    #[error("export job {job_id} still pending after {waited:?}")]
    PollTimeout { job_id: String, waited: Duration },
    #[error("all download attempts failed for job {job_id}")]
    DownloadExhausted { job_id: String },
    #[error("export payload is not valid utf-8: {0}")]
    PayloadEncoding(#[from] std::string::FromUtf8Error),
    #[error("payload decompression failed: {0}")]
    Decompress(#[from] std::io::Error),
    #[error("zip archive unreadable: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Connection settings for one Intercom workspace.
///
/// `base_url` is injectable so tests can point the client at a local mock.
#[derive(Debug, Clone)]
pub struct IntercomConfig {
    pub base_url: String,
    pub token: String,
    pub app_id: Option<String>,
    pub api_version: String,
    pub timeout: Duration,
}

impl IntercomConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            app_id: None,
            api_version: API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_app_id(mut self, app_id: Option<String>) -> Self {
        self.app_id = app_id;
        self
    }
}

/// Thin wrapper around `reqwest::Client` carrying auth and versioning headers.
#[derive(Debug, Clone)]
pub struct IntercomClient {
    http: reqwest::Client,
    config: IntercomConfig,
}

impl IntercomClient {
    pub fn new(config: IntercomConfig) -> Result<Self, IntercomError> {
        let http = reqwest::Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &IntercomConfig {
        &self.config
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn auth_headers(&self, accept: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.config.token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.config.api_version) {
            headers.insert("Intercom-Version", value);
        }
        headers
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

pub(crate) fn status_error(resp: &reqwest::Response) -> IntercomError {
    IntercomError::HttpStatus {
        status: resp.status().as_u16(),
        url: resp.url().to_string(),
    }
}
