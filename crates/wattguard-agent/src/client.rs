//! HTTP client for the WattGuard control plane.
//!
//! A thin `reqwest` wrapper, one method per endpoint the agent calls. Every
//! request carries an explicit 10 s timeout (`reqwest::Client::builder().timeout(...)`),
//! matching the original's `requests.Session` timeout convention.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const API_PREFIX: &str = "/api/v1";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected credentials (401)")]
    Unauthorized,
    #[error("server rejected the request as malformed ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("server returned {status}")]
    ServerError { status: u16 },
}

pub struct GreenOpsClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub fingerprint: &'a str,
    pub hostname: &'a str,
    pub os_type: &'a str,
    pub os_version: Option<String>,
    pub agent_version: &'a str,
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub machine_id: String,
    pub token: String,
    #[allow(dead_code)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub idle_seconds: u64,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatResponse {
    #[allow(dead_code)]
    pub status: String,
    #[allow(dead_code)]
    pub machine_status: String,
    #[allow(dead_code)]
    pub energy_wasted_kwh: f64,
    pub has_pending_command: bool,
}

#[derive(Debug, Deserialize)]
pub struct PollResponse {
    pub has_command: bool,
    pub command_id: Option<String>,
    #[allow(dead_code)]
    pub command_type: Option<String>,
    pub idle_threshold_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CommandResultRequest<'a> {
    pub command_id: &'a str,
    pub executed: bool,
    pub reason: Option<String>,
    pub idle_minutes_at_execution: Option<i64>,
}

impl GreenOpsClient {
    pub fn new(server_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: format!("{}{API_PREFIX}", server_url.trim_end_matches('/')),
            token,
        })
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn register(&self, req: &RegisterRequest<'_>) -> Result<RegisterResponse, ClientError> {
        let resp = self.http.post(self.url("/agents/register")).json(req).send().await?;
        parse_response(resp).await
    }

    pub async fn heartbeat(&self, req: &HeartbeatRequest) -> Result<HeartbeatResponse, ClientError> {
        let builder = self.authed(self.http.post(self.url("/agents/heartbeat")).json(req));
        let resp = builder.send().await?;
        parse_response(resp).await
    }

    pub async fn poll_command(&self) -> Result<PollResponse, ClientError> {
        let builder = self.authed(self.http.get(self.url("/agents/commands/poll")));
        let resp = builder.send().await?;
        parse_response(resp).await
    }

    pub async fn report_command(&self, req: &CommandResultRequest<'_>) -> Result<(), ClientError> {
        let builder = self.authed(self.http.post(self.url("/agents/commands/result")).json(req));
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        Err(status_to_error(status, resp.text().await.unwrap_or_default()))
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json().await.map_err(ClientError::from);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(status_to_error(status, body))
}

fn status_to_error(status: reqwest::StatusCode, body: String) -> ClientError {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return ClientError::Unauthorized;
    }
    if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
        return ClientError::Rejected { status: status.as_u16(), body };
    }
    ClientError::ServerError { status: status.as_u16() }
}
