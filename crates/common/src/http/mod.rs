//! Outbound HTTP seam
//!
//! The fetch engine and the API-backed data source only ever issue
//! `GET url?params` and look at the status code and the body text, so the
//! client is reduced to that contract. `ReqwestClient` is the real
//! implementation; `ScriptedClient` replays canned replies for tests and
//! offline runs.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Success status
pub const STATUS_OK: u16 = 200;

/// "Accepted, still processing" status
pub const STATUS_PROCESSING: u16 = 202;

/// Unknown identifier
pub const STATUS_NOT_FOUND: u16 = 404;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn is_processing(&self) -> bool {
        self.status == STATUS_PROCESSING
    }
}

/// Trait for the outbound network client
///
/// Implementations must be stateless with respect to callers so one client
/// can be shared by every request in a batch.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Issue `GET url` with the given query parameters
    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// reqwest-backed client
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl NetworkClient for ReqwestClient {
    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(url = url, status = status, bytes = body.len(), "GET completed");

        Ok(HttpResponse { status, body })
    }
}

/// One canned reply
#[derive(Debug, Clone)]
pub enum Reply {
    Response(HttpResponse),
    TransportError(String),
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Response(HttpResponse::new(STATUS_OK, body))
    }

    pub fn processing() -> Self {
        Reply::Response(HttpResponse::new(STATUS_PROCESSING, ""))
    }

    pub fn status(status: u16) -> Self {
        Reply::Response(HttpResponse::new(status, ""))
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Reply::TransportError(message.into())
    }
}

/// Client that replays scripted replies keyed by the value of one query parameter
///
/// Each key holds a queue of replies; the last reply of a queue repeats once
/// the queue is drained. Keys without a script get the fallback reply.
pub struct ScriptedClient {
    key_param: String,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, String)>>,
    fallback: Reply,
}

impl ScriptedClient {
    /// Create a client keyed by the query parameter `key_param`
    pub fn new(key_param: impl Into<String>) -> Self {
        Self {
            key_param: key_param.into(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fallback: Reply::status(STATUS_NOT_FOUND),
        }
    }

    /// Reply used for keys without a script
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    /// Queue replies for requests whose key parameter equals `key`
    pub fn script(self, key: impl Into<String>, replies: Vec<Reply>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(key.into()).or_default().extend(replies);
        }
        self
    }

    /// Number of requests seen for `key`
    pub fn calls_for(&self, key: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|(_, k)| k == key).count())
            .unwrap_or(0)
    }

    /// Total number of requests seen
    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Keys in request order
    pub fn call_log(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(_, k)| k.clone()).collect())
            .unwrap_or_default()
    }

    fn next_reply(&self, key: &str) -> Reply {
        let Ok(mut scripts) = self.scripts.lock() else {
            return self.fallback.clone();
        };
        match scripts.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| self.fallback.clone()),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

#[async_trait]
impl NetworkClient for ScriptedClient {
    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse> {
        let key = params
            .iter()
            .find(|(name, _)| *name == self.key_param)
            .map(|(_, value)| value.to_string())
            .unwrap_or_default();

        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), key.clone()));
        }

        match self.next_reply(&key) {
            Reply::Response(response) => Ok(response),
            Reply::TransportError(message) => Err(AppError::Transport { message }),
        }
    }
}
