//! Runtime configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "PMU Studio";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds before an HTTP request to the studio API is abandoned.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_DATABASE_PATH: &str = "PMU_STUDIO_DATABASE_PATH";
const ENV_API_BASE_URL: &str = "PMU_STUDIO_API_BASE_URL";
const ENV_STUDIO_ID: &str = "PMU_STUDIO_ID";
const ENV_API_TOKEN: &str = "PMU_STUDIO_API_TOKEN";
const ENV_REQUEST_TIMEOUT: &str = "PMU_STUDIO_REQUEST_TIMEOUT_SECS";
const ENV_LOG_FILTER: &str = "PMU_STUDIO_LOG";

/// Log filter used when neither `RUST_LOG` nor the config sets one.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "pmu_studio_core=debug,info"
    } else {
        "pmu_studio_core=info,warn"
    }
}

/// Settings for one studio installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioConfig {
    pub database_path: PathBuf,
    /// Base URL of the REST API; None keeps the store offline
    pub api_base_url: Option<String>,
    pub studio_id: String,
    /// Bearer token sent with every API request
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("pmu-studio.db"),
            api_base_url: None,
            studio_id: "default".to_string(),
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            log_filter: default_log_filter().to_string(),
        }
    }
}

impl StudioConfig {
    /// Defaults overridden by `PMU_STUDIO_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(path) = get(ENV_DATABASE_PATH) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(url) = get(ENV_API_BASE_URL) {
            config.api_base_url = Some(url);
        }
        if let Some(studio_id) = get(ENV_STUDIO_ID) {
            config.studio_id = studio_id;
        }
        if let Some(token) = get(ENV_API_TOKEN) {
            config.api_token = Some(token);
        }
        if let Some(timeout) = get(ENV_REQUEST_TIMEOUT) {
            match timeout.parse() {
                Ok(secs) => config.request_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %timeout, "ignoring invalid request timeout"),
            }
        }
        if let Some(filter) = get(ENV_LOG_FILTER) {
            config.log_filter = filter;
        }
        config
    }

    /// Whether a remote API is configured.
    pub fn is_online(&self) -> bool {
        self.api_base_url.is_some()
    }
}
