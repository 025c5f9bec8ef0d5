//! Dashboard primitives the reporting channel reads from and writes to.
//!
//! The dashboard owns all durable bug and job state and is the authority on
//! idempotence: applying the same update twice is its problem, not ours.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::command::BugUpdate;
use crate::report::{BugReport, JobReport};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dashboard api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("{0}")]
    Other(String),
}

/// Dashboard verdict on an update. A rejected update may carry a reason
/// meant for the person who sent the command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub accepted: bool,
    pub reason: String,
}

impl CommandOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: reason.into(),
        }
    }
}

pub trait BugStore: Send + Sync {
    /// Bugs that became reportable on the given channel.
    fn reporting_poll(&self, channel: &str) -> Result<Vec<BugReport>, StoreError>;
    fn poll_completed_jobs(&self, channel: &str) -> Result<Vec<JobReport>, StoreError>;
    fn apply_command(&self, update: &BugUpdate) -> Result<CommandOutcome, StoreError>;
    fn mark_job_reported(&self, job_id: &str) -> Result<(), StoreError>;
}

/// A `test:` command: test `patch` against `repo`/`branch` for a bug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestRequest {
    pub bug_id: String,
    pub user: String,
    pub ext_id: String,
    pub patch: Option<String>,
    pub repo: String,
    pub branch: String,
}

pub trait TestRequests: Send + Sync {
    /// Returns text to mail back to the requester; empty means no reply.
    fn handle_test_request(&self, request: &TestRequest) -> Result<String, StoreError>;
}

/// JSON-over-HTTP client for the dashboard API.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    reports: Vec<BugReport>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<JobReport>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    ok: bool,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TestResponse {
    #[serde(default)]
    text: String,
}

impl DashboardClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn call<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Resp, StoreError> {
        let url = format!("{}/api/{}", self.base_url.trim_end_matches('/'), method);
        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }
}

impl BugStore for DashboardClient {
    fn reporting_poll(&self, channel: &str) -> Result<Vec<BugReport>, StoreError> {
        let response: PollResponse = self.call("reporting_poll", &json!({ "type": channel }))?;
        Ok(response.reports)
    }

    fn poll_completed_jobs(&self, channel: &str) -> Result<Vec<JobReport>, StoreError> {
        let response: JobsResponse =
            self.call("poll_completed_jobs", &json!({ "type": channel }))?;
        Ok(response.jobs)
    }

    fn apply_command(&self, update: &BugUpdate) -> Result<CommandOutcome, StoreError> {
        let response: UpdateResponse = self.call("reporting_update", update)?;
        Ok(CommandOutcome {
            accepted: response.ok,
            reason: response.text,
        })
    }

    fn mark_job_reported(&self, job_id: &str) -> Result<(), StoreError> {
        let _: serde_json::Value = self.call("job_reported", &json!({ "job_id": job_id }))?;
        Ok(())
    }
}

impl TestRequests for DashboardClient {
    fn handle_test_request(&self, request: &TestRequest) -> Result<String, StoreError> {
        let response: TestResponse = self.call("test_request", request)?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BugStatus, ReproLevel};
    use mockito::{Matcher, Server};

    #[test]
    fn reporting_poll_decodes_reports() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/api/reporting_poll")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({"type": "email"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"reports":[{"id":"b1","title":"WARNING in foo","repro_syz":"cjAgPSBvcGVuKCk="}]}"#)
            .expect(1)
            .create();

        let client = DashboardClient::new(server.url(), Some("secret".to_string()));
        let reports = client.reporting_poll("email").expect("poll");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].title, "WARNING in foo");
        assert_eq!(reports[0].repro_syz, b"r0 = open()".to_vec());
        mock.assert();
    }

    #[test]
    fn apply_command_maps_ok_and_text() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/api/reporting_update")
            .match_body(Matcher::PartialJson(json!({
                "id": "b1",
                "status": "open",
                "repro_level": "syz",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"text":"bug is already fixed"}"#)
            .create();

        let client = DashboardClient::new(server.url(), None);
        let update = BugUpdate {
            id: "b1".to_string(),
            status: BugStatus::Open,
            repro_level: Some(ReproLevel::Syz),
            ..Default::default()
        };
        let outcome = client.apply_command(&update).expect("update");
        assert_eq!(outcome, CommandOutcome::rejected("bug is already fixed"));
    }

    #[test]
    fn non_success_status_is_store_error() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/api/job_reported")
            .with_status(500)
            .with_body("datastore timeout")
            .create();

        let client = DashboardClient::new(server.url(), None);
        let err = client.mark_job_reported("job-1").expect_err("error");
        match err {
            StoreError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "datastore timeout");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_request_returns_reply_text() {
        let mut server = Server::new();
        let _mock = server
            .mock("POST", "/api/test_request")
            .match_body(Matcher::PartialJson(json!({
                "bug_id": "b1",
                "repo": "git://repo",
                "branch": "master",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"this bug has no reproducer"}"#)
            .create();

        let client = DashboardClient::new(server.url(), None);
        let reply = client
            .handle_test_request(&TestRequest {
                bug_id: "b1".to_string(),
                repo: "git://repo".to_string(),
                branch: "master".to_string(),
                ..Default::default()
            })
            .expect("test request");
        assert_eq!(reply, "this bug has no reproducer");
    }
}
