//! Shared remote documents — whole-document GET/PUT, nothing else.
//!
//! The registry and the feed live in two independently addressed JSON
//! documents. There is no partial update and no compare-and-swap: every
//! write re-sends the entire collection, and concurrent writers race
//! (last write wins). That contract is the point — see the directory
//! client for how it is used.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document request failed: {0}")]
    Network(String),
}

/// A named JSON document, fetched and overwritten whole.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document. A missing document is `Value::Null`, not an error.
    async fn get(&self, name: &str) -> Result<Value, DocumentError>;

    /// Overwrite a document with the given value.
    async fn put(&self, name: &str, value: Value) -> Result<(), DocumentError>;
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// Shared in-memory documents — the store used by tests and by in-process
/// swarms. Clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    docs: Arc<DashMap<String, Value>>,
    failing: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise outage handling.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Read a document without going through the trait (test inspection).
    pub fn peek(&self, name: &str) -> Value {
        self.docs.get(name).map(|d| d.clone()).unwrap_or(Value::Null)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, name: &str) -> Result<Value, DocumentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Network("simulated outage".to_string()));
        }
        Ok(self.peek(name))
    }

    async fn put(&self, name: &str, value: Value) -> Result<(), DocumentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DocumentError::Network("simulated outage".to_string()));
        }
        self.docs.insert(name.to_string(), value);
        Ok(())
    }
}

// ── HTTP implementation ───────────────────────────────────────────────────────

/// Documents behind plain HTTP endpoints: GET returns the JSON body, PUT
/// replaces it. Each document name maps to one URL.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    urls: DashMap<String, String>,
}

impl HttpDocumentStore {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client construction cannot fail");
        Self {
            client,
            urls: DashMap::new(),
        }
    }

    /// Map a document name to its endpoint URL.
    pub fn with_document(self, name: &str, url: &str) -> Self {
        self.urls.insert(name.to_string(), url.to_string());
        self
    }

    fn url_for(&self, name: &str) -> Result<String, DocumentError> {
        self.urls
            .get(name)
            .map(|u| u.clone())
            .ok_or_else(|| DocumentError::Network(format!("no endpoint configured for '{name}'")))
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, name: &str) -> Result<Value, DocumentError> {
        let url = self.url_for(name)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DocumentError::Network(e.to_string()))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| DocumentError::Network(e.to_string()))
    }

    async fn put(&self, name: &str, value: Value) -> Result<(), DocumentError> {
        let url = self.url_for(name)?;
        self.client
            .put(&url)
            .json(&value)
            .send()
            .await
            .map_err(|e| DocumentError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| DocumentError::Network(e.to_string()))?;
        Ok(())
    }
}
