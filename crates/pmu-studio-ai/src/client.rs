//! Clients for the analysis endpoint.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, AnalysisResult};

/// Path of the analysis endpoint under the API base URL.
pub const ANALYZE_PATH: &str = "/api/analyze";

/// Something that turns a (system, prompt) pair into model text.
pub trait AnalysisClient {
    fn complete(&self, system: &str, prompt: &str) -> AnalysisResult<String>;
}

/// HTTP client for `POST {base}/api/analyze`.
pub struct HttpAnalysisClient {
    base_url: String,
    api_token: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, api_token: Option<String>, timeout_secs: u64) -> AnalysisResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnalysisError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            client,
            timeout_secs,
        })
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, ANALYZE_PATH)
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    system: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    response: String,
}

impl AnalysisClient for HttpAnalysisClient {
    fn complete(&self, system: &str, prompt: &str) -> AnalysisResult<String> {
        let mut request = self
            .client
            .post(self.url())
            .json(&AnalyzeRequest { system, prompt });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                AnalysisError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                AnalysisError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                AnalysisError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "analysis request failed");
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnalyzeResponse = response
            .json()
            .map_err(|e| AnalysisError::InvalidFormat(e.to_string()))?;
        Ok(parsed.response)
    }
}

/// Mock client returning a fixed response and remembering the last request.
pub struct MockAnalysisClient {
    response: String,
    last_request: Mutex<Option<(String, String)>>,
}

impl MockAnalysisClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            last_request: Mutex::new(None),
        }
    }

    /// The (system, prompt) pair of the last call.
    pub fn last_request(&self) -> Option<(String, String)> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

impl AnalysisClient for MockAnalysisClient {
    fn complete(&self, system: &str, prompt: &str) -> AnalysisResult<String> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((system.to_string(), prompt.to_string()));
        }
        Ok(self.response.clone())
    }
}
