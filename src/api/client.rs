//! HTTP client for the test drive API

use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use testdrive_shared::{
    intervals, ApiEnvelope, LocationPayload, SensorPayload, Session, SessionStatus,
    DEFAULT_API_URL, LOCATION_PATH, SENSOR_PATH, TEST_DRIVES_PATH,
};
use thiserror::Error;
use tracing::debug;

/// Errors from a single API call
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API configuration: {0}")]
    Config(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("Malformed response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("API reported failure: {0}")]
    Rejected(String),
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://example.com` (no trailing path)
    pub base_url: String,
    /// Bound for every request
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.into(),
            request_timeout: Duration::from_millis(intervals::REQUEST_TIMEOUT_MS),
        }
    }
}

/// Talks to the remote test drive API
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "base URL must start with http:// or https://, got {:?}",
                config.base_url
            )));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else if error.is_decode() {
            ApiError::Decode(error)
        } else {
            ApiError::Transport(error)
        }
    }

    /// List test drives, optionally narrowed to one status server-side
    pub async fn list_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, ApiError> {
        let mut request = self.http.get(self.url(TEST_DRIVES_PATH));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        if response.status() != StatusCode::OK {
            return Err(ApiError::Status(response.status()));
        }

        let envelope: ApiEnvelope<Vec<Session>> =
            response.json().await.map_err(|e| self.classify(e))?;
        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope.error.unwrap_or_else(|| "success=false".into()),
            ));
        }

        let sessions = envelope.data.unwrap_or_default();
        debug!("[API] {} test drive(s) listed", sessions.len());
        Ok(sessions)
    }

    /// Send one sensor reading
    pub async fn post_sensor(&self, payload: &SensorPayload) -> Result<(), ApiError> {
        self.post_json(SENSOR_PATH, payload).await
    }

    /// Send one GPS fix
    pub async fn post_location(&self, payload: &LocationPayload) -> Result<(), ApiError> {
        self.post_json(LOCATION_PATH, payload).await
    }

    /// POST a JSON body; only 200 and 201 count as success
    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => Err(ApiError::Status(status)),
        }
    }
}
