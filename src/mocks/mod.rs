//! Mock implementations for testing.
//!
//! Provides a scripted transport and a recording event sink so the client and
//! the task runner can be exercised without network access or a database.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::observability::{EventLogError, EventLogger, LogEntry};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::raw(200, body).with_header("content-type", "application/json")
    }

    /// Creates an error response with an OpenRouter-style body.
    pub fn error(status: u16, message: &str) -> Self {
        let error = serde_json::json!({
            "error": {
                "message": message,
                "code": status
            }
        });
        let body = serde_json::to_vec(&error).unwrap_or_default();
        Self::raw(status, body).with_header("content-type", "application/json")
    }

    /// Creates a response with an arbitrary body.
    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Adds a header. Names are stored lower-cased, as reqwest reports them.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

enum Scripted {
    Response(MockResponse),
    Error(TransportError),
}

/// Mock HTTP transport for testing.
///
/// Scripted outcomes are consumed in order; once the queue is empty the
/// default response is returned (HTTP 500 unless configured).
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Mutex<Option<MockResponse>>,
    closed: AtomicBool,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        lock(&self.script).push_back(Scripted::Response(response));
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues an error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Queues a transport-level failure.
    pub fn queue_transport_error(&self, error: TransportError) {
        lock(&self.script).push_back(Scripted::Error(error));
    }

    /// Sets the default response.
    pub fn set_default(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Parses the body of the last recorded request as JSON.
    pub fn last_request_json(&self) -> Option<serde_json::Value> {
        let body = self.last_request()?.body?;
        serde_json::from_slice(&body).ok()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_outcome(&self) -> Scripted {
        if let Some(next) = lock(&self.script).pop_front() {
            return next;
        }
        Scripted::Response(
            lock(&self.default_response)
                .clone()
                .unwrap_or_else(|| MockResponse::error(500, "No mock response configured")),
        )
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        lock(&self.requests).push(RecordedRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            headers: request.headers,
            timeout: request.timeout,
        });

        match self.next_outcome() {
            Scripted::Response(response) => Ok(HttpResponse {
                status: response.status,
                headers: response.headers,
                body: response.body,
            }),
            Scripted::Error(error) => Err(error),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Event sink that keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLogger {
    entries: Mutex<Vec<LogEntry>>,
    fail: AtomicBool,
}

impl MemoryEventLogger {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that rejects every entry.
    pub fn failing() -> Self {
        let logger = Self::default();
        logger.fail.store(true, Ordering::SeqCst);
        logger
    }

    /// Returns the stored entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }
}

impl EventLogger for MemoryEventLogger {
    fn log(&self, entry: &LogEntry) -> Result<(), EventLogError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EventLogError {
                message: "sink rejected entry".to_string(),
            });
        }
        lock(&self.entries).push(entry.clone());
        Ok(())
    }
}
