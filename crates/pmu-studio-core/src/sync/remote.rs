//! Remote REST collections.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use super::{SyncError, SyncResult};
use crate::config::StudioConfig;

/// Collection paths on the studio API.
pub const CLIENTS_PATH: &str = "/api/clients";
pub const TEAM_MEMBERS_PATH: &str = "/api/studio/team-members";
pub const CONSENT_FORMS_PATH: &str = "/api/consent-forms";

/// Header naming the tenant a request acts for.
pub const STUDIO_HEADER: &str = "X-Studio-Id";

/// A JSON collection with list/create/update/delete.
///
/// Remote payloads carry the server id in their `id` field.
pub trait RemoteCollection {
    fn list(&self) -> SyncResult<Vec<Value>>;

    /// Create a record and return it as stored (with its new `id`).
    fn create(&self, payload: &Value) -> SyncResult<Value>;

    fn update(&self, id: &str, payload: &Value) -> SyncResult<Value>;

    fn delete(&self, id: &str) -> SyncResult<()>;
}

/// Read the server id of a remote payload. Numeric ids are accepted.
pub fn remote_id(value: &Value) -> SyncResult<String> {
    match value.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(SyncError::InvalidPayload("missing id".into())),
    }
}

/// Collection served over HTTP with a blocking client.
pub struct HttpCollection {
    client: reqwest::blocking::Client,
    url: String,
    studio_id: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpCollection {
    pub fn new(config: &StudioConfig, path: &str) -> SyncResult<Self> {
        let base_url = config
            .api_base_url
            .as_deref()
            .ok_or_else(|| SyncError::NotConfigured("api_base_url".into()))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            studio_id: config.studio_id.clone(),
            token: config.api_token.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(STUDIO_HEADER, &self.studio_id);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn send(&self, builder: reqwest::blocking::RequestBuilder) -> SyncResult<reqwest::blocking::Response> {
        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                SyncError::Connection(self.url.clone())
            } else if e.is_timeout() {
                SyncError::Http(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                SyncError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn json(response: reqwest::blocking::Response) -> SyncResult<Value> {
        response
            .json()
            .map_err(|e| SyncError::InvalidPayload(e.to_string()))
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.url, id)
    }
}

impl RemoteCollection for HttpCollection {
    fn list(&self) -> SyncResult<Vec<Value>> {
        let response = self.send(self.request(reqwest::Method::GET, &self.url))?;
        match Self::json(response)? {
            Value::Array(items) => Ok(items),
            other => Err(SyncError::InvalidPayload(format!(
                "expected an array, got {}",
                other
            ))),
        }
    }

    fn create(&self, payload: &Value) -> SyncResult<Value> {
        let response = self.send(self.request(reqwest::Method::POST, &self.url).json(payload))?;
        Self::json(response)
    }

    fn update(&self, id: &str, payload: &Value) -> SyncResult<Value> {
        let url = self.item_url(id);
        let response = self.send(self.request(reqwest::Method::PUT, &url).json(payload))?;
        Self::json(response)
    }

    fn delete(&self, id: &str) -> SyncResult<()> {
        let url = self.item_url(id);
        self.send(self.request(reqwest::Method::DELETE, &url))?;
        Ok(())
    }
}

/// In-process collection for tests and offline demos.
#[derive(Default)]
pub struct MemoryCollection {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    items: BTreeMap<String, Value>,
    next_id: u64,
    failing: bool,
    writes: usize,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the server were unreachable.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.failing = failing;
        }
    }

    /// Store a record as if another device had created it.
    pub fn seed(&self, id: &str, payload: Value) {
        if let Ok(mut state) = self.state.lock() {
            let mut item = payload;
            if let Value::Object(map) = &mut item {
                map.insert("id".into(), Value::String(id.to_string()));
            }
            state.items.insert(id.to_string(), item);
        }
    }

    pub fn get(&self, id: &str) -> Option<Value> {
        self.state.lock().ok()?.items.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful create/update/delete calls.
    pub fn write_count(&self) -> usize {
        self.state.lock().map(|s| s.writes).unwrap_or(0)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> SyncResult<T>) -> SyncResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| SyncError::Remote(format!("Lock poisoned: {}", e)))?;
        if state.failing {
            return Err(SyncError::Connection("memory://".into()));
        }
        f(&mut state)
    }
}

fn with_id(payload: &Value, id: &str) -> SyncResult<Value> {
    let mut item = payload.clone();
    match &mut item {
        Value::Object(map) => {
            map.insert("id".into(), Value::String(id.to_string()));
            Ok(item)
        }
        _ => Err(SyncError::InvalidPayload("expected an object".into())),
    }
}

impl RemoteCollection for MemoryCollection {
    fn list(&self) -> SyncResult<Vec<Value>> {
        self.with_state(|state| Ok(state.items.values().cloned().collect()))
    }

    fn create(&self, payload: &Value) -> SyncResult<Value> {
        self.with_state(|state| {
            state.next_id += 1;
            let id = format!("srv-{}", state.next_id);
            let item = with_id(payload, &id)?;
            state.items.insert(id, item.clone());
            state.writes += 1;
            Ok(item)
        })
    }

    fn update(&self, id: &str, payload: &Value) -> SyncResult<Value> {
        self.with_state(|state| {
            if !state.items.contains_key(id) {
                return Err(SyncError::Status {
                    status: 404,
                    body: format!("{} not found", id),
                });
            }
            let item = with_id(payload, id)?;
            state.items.insert(id.to_string(), item.clone());
            state.writes += 1;
            Ok(item)
        })
    }

    fn delete(&self, id: &str) -> SyncResult<()> {
        self.with_state(|state| {
            if state.items.remove(id).is_none() {
                return Err(SyncError::Status {
                    status: 404,
                    body: format!("{} not found", id),
                });
            }
            state.writes += 1;
            Ok(())
        })
    }
}
