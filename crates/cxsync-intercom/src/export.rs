//! Reporting export lifecycle: enqueue, poll with backoff, download with
//! fallback endpoints.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{status_error, IntercomClient, IntercomError};

/// Dataset slice requested from the reporting export API.
pub const CONVERSATION_DATASET: &str = "conversation";

/// Columns requested in every conversation export.
pub const DEFAULT_ATTRIBUTE_IDS: &[&str] = &[
    "conversation_id",
    "conversation_started_at",
    "conversation_last_closed_at",
    "conversation_state",
    "currently_assigned_teammate_id",
    "currently_assigned_teammate_raw_id",
    "currently_assigned_team_id",
    "ai_cx_score_rating",
    "conversation_rating",
    "fin_ai_agent_rating",
    "ai_cx_score_explanation",
];

/// Response fields that may carry the job id, in acceptance order.
const JOB_ID_FIELDS: &[&str] = &["job_identifier", "id", "jobId"];
const STATUS_FIELDS: &[&str] = &["status", "state"];

const SUCCESS_STATUSES: &[&str] = &["complete", "completed", "success"];
const FAILURE_STATUSES: &[&str] = &["failed", "error"];

/// An asynchronous server-side export job, re-read on every poll.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub job_identifier: String,
    pub status: String,
    pub download_url: Option<String>,
}

/// Poller knobs, injectable so tests run with millisecond delays.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_wait: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    Failed,
    Pending,
}

/// Terminal-state classification for one poll response. A download reference
/// is terminal-success no matter what the status string says.
pub fn classify_poll(job: &ExportJob) -> PollOutcome {
    if job.download_url.as_deref().is_some_and(|u| !u.is_empty()) {
        return PollOutcome::Ready;
    }
    let status = job.status.to_lowercase();
    if SUCCESS_STATUSES.contains(&status.as_str()) {
        PollOutcome::Ready
    } else if FAILURE_STATUSES.contains(&status.as_str()) {
        PollOutcome::Failed
    } else {
        PollOutcome::Pending
    }
}

fn field_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_job_id(body: &Value) -> Option<String> {
    JOB_ID_FIELDS
        .iter()
        .find_map(|field| body.get(field).and_then(field_as_string))
}

fn extract_status(body: &Value) -> String {
    STATUS_FIELDS
        .iter()
        .find_map(|field| body.get(field).and_then(|v| v.as_str()))
        .unwrap_or_default()
        .to_string()
}

fn job_from_body(job_identifier: String, body: &Value) -> ExportJob {
    ExportJob {
        job_identifier,
        status: extract_status(body),
        download_url: body
            .get("download_url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

impl IntercomClient {
    /// Submit an export job for the given epoch-seconds window.
    pub async fn enqueue_export(
        &self,
        start_time: i64,
        end_time: i64,
        attribute_ids: &[&str],
    ) -> Result<ExportJob, IntercomError> {
        let url = self.url("/export/reporting_data/enqueue");
        let payload = json!({
            "dataset_id": CONVERSATION_DATASET,
            "attribute_ids": attribute_ids,
            "start_time": start_time,
            "end_time": end_time,
        });

        let resp = self
            .http()
            .post(&url)
            .headers(self.auth_headers("application/json"))
            .json(&payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(&resp));
        }
        let body: Value = resp.json().await?;

        let job_id = extract_job_id(&body).ok_or(IntercomError::MissingJobId)?;
        let job = job_from_body(job_id, &body);
        info!(job_id = %job.job_identifier, status = %job.status, "export job enqueued");
        Ok(job)
    }

    /// Re-read a job's state once.
    pub async fn fetch_export_job(&self, job_id: &str) -> Result<ExportJob, IntercomError> {
        let url = self.url(&format!("/export/reporting_data/{job_id}"));
        let mut request = self
            .http()
            .get(&url)
            .headers(self.auth_headers("application/json"));
        if let Some(app_id) = &self.config().app_id {
            request = request.query(&[("app_id", app_id)]);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(&resp));
        }
        let body: Value = resp.json().await?;
        Ok(job_from_body(job_id.to_string(), &body))
    }

    /// Poll a job until it is ready, fails, or exceeds the wall-clock budget.
    /// Delays double per retry up to the configured cap.
    pub async fn poll_export(
        &self,
        job_id: &str,
        config: &PollConfig,
    ) -> Result<ExportJob, IntercomError> {
        let start = Instant::now();
        let mut delay = config.initial_delay;

        loop {
            let job = self.fetch_export_job(job_id).await?;
            match classify_poll(&job) {
                PollOutcome::Ready => return Ok(job),
                PollOutcome::Failed => {
                    return Err(IntercomError::JobFailed {
                        job_id: job_id.to_string(),
                        status: job.status,
                    })
                }
                PollOutcome::Pending => {
                    info!(job_id, status = %job.status, "export job still pending");
                }
            }

            if start.elapsed() > config.max_wait {
                return Err(IntercomError::PollTimeout {
                    job_id: job_id.to_string(),
                    waited: start.elapsed(),
                });
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(config.max_delay);
        }
    }

    /// Download the job payload. Tries the direct download reference with
    /// auth, then bare (presigned urls reject extra headers), then the
    /// job-scoped fallback endpoint.
    pub async fn download_export(&self, job: &ExportJob) -> Result<Vec<u8>, IntercomError> {
        if let Some(download_url) = &job.download_url {
            match self.try_download(download_url, true).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => warn!(%err, "authorized download_url attempt failed"),
            }
            match self.try_download(download_url, false).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => warn!(%err, "bare download_url attempt failed"),
            }
        }

        let fallback = self.url(&format!("/download/reporting_data/{}", job.job_identifier));
        let mut request = self
            .http()
            .get(&fallback)
            .headers(self.auth_headers("application/octet-stream"))
            .query(&[("job_identifier", job.job_identifier.as_str())]);
        if let Some(app_id) = &self.config().app_id {
            request = request.query(&[("app_id", app_id)]);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => Ok(resp.bytes().await?.to_vec()),
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "fallback download endpoint failed");
                Err(IntercomError::DownloadExhausted {
                    job_id: job.job_identifier.clone(),
                })
            }
            Err(err) => {
                warn!(%err, "fallback download endpoint unreachable");
                Err(IntercomError::DownloadExhausted {
                    job_id: job.job_identifier.clone(),
                })
            }
        }
    }

    async fn try_download(&self, url: &str, with_auth: bool) -> Result<Vec<u8>, IntercomError> {
        let request = if with_auth {
            self.http()
                .get(url)
                .headers(self.auth_headers("application/octet-stream"))
        } else {
            self.http().get(url)
        };
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(&resp));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IntercomConfig;

    fn client(base_url: &str) -> IntercomClient {
        let config = IntercomConfig::new("test-token")
            .with_base_url(base_url)
            .with_app_id(Some("testapp".to_string()));
        IntercomClient::new(config).unwrap()
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_wait: Duration::from_millis(200),
        }
    }

    #[test]
    fn job_id_fields_are_checked_in_order() {
        let body = json!({"jobId": "low", "id": 42, "job_identifier": "primary"});
        assert_eq!(extract_job_id(&body).as_deref(), Some("primary"));

        let body = json!({"jobId": "low", "id": 42});
        assert_eq!(extract_job_id(&body).as_deref(), Some("42"));

        let body = json!({"jobId": "low"});
        assert_eq!(extract_job_id(&body).as_deref(), Some("low"));

        assert_eq!(extract_job_id(&json!({"other": 1})), None);
    }

    #[test]
    fn download_url_is_terminal_regardless_of_status() {
        let job = ExportJob {
            job_identifier: "j1".into(),
            status: "in_progress".into(),
            download_url: Some("https://example.com/x.csv.gz".into()),
        };
        assert_eq!(classify_poll(&job), PollOutcome::Ready);
    }

    #[test]
    fn status_sets_are_case_insensitive() {
        let mut job = ExportJob {
            job_identifier: "j1".into(),
            status: "COMPLETE".into(),
            download_url: None,
        };
        assert_eq!(classify_poll(&job), PollOutcome::Ready);
        job.status = "Failed".into();
        assert_eq!(classify_poll(&job), PollOutcome::Failed);
        job.status = "queued".into();
        assert_eq!(classify_poll(&job), PollOutcome::Pending);
    }

    #[tokio::test]
    async fn enqueue_extracts_job_identifier() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/export/reporting_data/enqueue")
            .match_header("authorization", "Bearer test-token")
            .match_header("intercom-version", "2.14")
            .with_status(200)
            .with_body(r#"{"job_identifier": "job-abc", "status": "pending"}"#)
            .create_async()
            .await;

        let job = client(&server.url())
            .enqueue_export(100, 200, DEFAULT_ATTRIBUTE_IDS)
            .await
            .unwrap();
        assert_eq!(job.job_identifier, "job-abc");
        assert_eq!(job.status, "pending");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn enqueue_without_job_id_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/export/reporting_data/enqueue")
            .with_status(200)
            .with_body(r#"{"status": "pending"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .enqueue_export(100, 200, DEFAULT_ATTRIBUTE_IDS)
            .await
            .unwrap_err();
        assert!(matches!(err, IntercomError::MissingJobId));
    }

    #[tokio::test]
    async fn poll_returns_job_once_download_url_appears() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/export/reporting_data/job-1")
            .match_query(mockito::Matcher::UrlEncoded("app_id".into(), "testapp".into()))
            .with_status(200)
            .with_body(r#"{"status": "in_progress", "download_url": "https://cdn.example/x"}"#)
            .create_async()
            .await;

        let job = client(&server.url())
            .poll_export("job-1", &fast_poll())
            .await
            .unwrap();
        assert_eq!(job.download_url.as_deref(), Some("https://cdn.example/x"));
    }

    #[tokio::test]
    async fn poll_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex(r"/export/reporting_data/job-2.*".into()))
            .with_status(200)
            .with_body(r#"{"state": "failed"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .poll_export("job-2", &fast_poll())
            .await
            .unwrap_err();
        assert!(matches!(err, IntercomError::JobFailed { .. }));
    }

    #[tokio::test]
    async fn poll_retries_then_times_out_on_perpetual_pending() {
        let mut server = mockito::Server::new_async().await;
        let pending = server
            .mock("GET", mockito::Matcher::Regex(r"/export/reporting_data/job-3.*".into()))
            .with_status(200)
            .with_body(r#"{"status": "queued"}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let err = client(&server.url())
            .poll_export("job-3", &fast_poll())
            .await
            .unwrap_err();
        assert!(matches!(err, IntercomError::PollTimeout { .. }));
        pending.assert_async().await;
    }

    #[tokio::test]
    async fn download_falls_back_to_job_endpoint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken-download")
            .with_status(403)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", "/download/reporting_data/job-4")
            .match_query(mockito::Matcher::UrlEncoded(
                "job_identifier".into(),
                "job-4".into(),
            ))
            .with_status(200)
            .with_body("a,b\n1,2\n")
            .create_async()
            .await;

        let c = client(&server.url());
        let job = ExportJob {
            job_identifier: "job-4".into(),
            status: "complete".into(),
            download_url: Some(format!("{}/broken-download", server.url())),
        };
        let bytes = c.download_export(&job).await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn download_exhaustion_is_fatal() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .expect_at_least(1)
            .create_async()
            .await;

        let c = client(&server.url());
        let job = ExportJob {
            job_identifier: "job-5".into(),
            status: "complete".into(),
            download_url: Some(format!("{}/dl", server.url())),
        };
        let err = c.download_export(&job).await.unwrap_err();
        assert!(matches!(err, IntercomError::DownloadExhausted { .. }));
    }
}
