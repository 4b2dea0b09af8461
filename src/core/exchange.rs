//! Per-invocation request/response plumbing shared by the application and the
//! function entry point.
//!
//! A [`ResponseWriter`] buffers one response and records whether its head has
//! been committed. A [`Completion`] is the one-shot signal an application uses
//! to report that it is done with a request; settling consumes it, so a
//! completion can never be settled twice.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode, header::CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Message used in error bodies unless development mode is enabled.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// Status or headers were changed after the head was committed.
    HeadersSent,
    /// A write was attempted after the response ended.
    Finished,
    /// The body could not be encoded.
    Encode(String),
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::HeadersSent => f.write_str("response headers were already sent"),
            ResponseError::Finished => f.write_str("response already ended"),
            ResponseError::Encode(msg) => write!(f, "failed to encode response body: {msg}"),
        }
    }
}

impl std::error::Error for ResponseError {}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    headers_sent: bool,
    finished: bool,
    writes: usize,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            headers_sent: false,
            finished: false,
            writes: 0,
        }
    }
}

/// Buffered response for a single invocation.
///
/// Clones share the same underlying response, so the application and the
/// entry point observe the same `headers_sent` state.
#[derive(Debug, Clone, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<ResponseState>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn headers_sent(&self) -> bool {
        self.lock().headers_sent
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Number of writes that reached the response (body chunks or full sends).
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    pub fn set_status(&self, status: StatusCode) -> Result<(), ResponseError> {
        let mut state = self.lock();
        if state.headers_sent {
            return Err(ResponseError::HeadersSent);
        }
        state.status = status;
        Ok(())
    }

    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) -> Result<(), ResponseError> {
        let mut state = self.lock();
        if state.headers_sent {
            return Err(ResponseError::HeadersSent);
        }
        state.headers.insert(name, value);
        Ok(())
    }

    /// Commits status and headers. Later status/header changes are rejected.
    pub fn send_head(&self) -> Result<(), ResponseError> {
        let mut state = self.lock();
        if state.headers_sent {
            return Err(ResponseError::HeadersSent);
        }
        state.headers_sent = true;
        Ok(())
    }

    /// Appends a body chunk, committing the head first if needed.
    pub fn write(&self, chunk: &[u8]) -> Result<(), ResponseError> {
        let mut state = self.lock();
        if state.finished {
            return Err(ResponseError::Finished);
        }
        state.headers_sent = true;
        state.body.extend_from_slice(chunk);
        state.writes += 1;
        Ok(())
    }

    pub fn end(&self) -> Result<(), ResponseError> {
        let mut state = self.lock();
        if state.finished {
            return Err(ResponseError::Finished);
        }
        state.headers_sent = true;
        state.finished = true;
        Ok(())
    }

    /// Writes a complete response in one step.
    ///
    /// Headers set earlier are kept unless `headers` replaces them.
    pub fn send(
        &self,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<(), ResponseError> {
        let mut state = self.lock();
        if state.headers_sent {
            return Err(ResponseError::HeadersSent);
        }
        state.status = status;
        state.headers.extend(headers);
        state.body = body.to_vec();
        state.headers_sent = true;
        state.finished = true;
        state.writes += 1;
        Ok(())
    }

    pub fn json<T: Serialize>(&self, status: StatusCode, value: &T) -> Result<(), ResponseError> {
        let body =
            serde_json::to_vec(value).map_err(|err| ResponseError::Encode(err.to_string()))?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(status, headers, Bytes::from(body))
    }

    /// Snapshot of the response as it stands now.
    pub fn to_response(&self) -> Response<Bytes> {
        let state = self.lock();
        let mut response = Response::new(Bytes::from(state.body.clone()));
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers.clone();
        response
    }
}

/// Failure reported by an application through [`Completion::fail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    message: String,
}

impl AppError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

impl From<&str> for AppError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::new(value.to_string())
    }
}

impl From<ResponseError> for AppError {
    fn from(value: ResponseError) -> Self {
        Self::new(value.to_string())
    }
}

/// Why a delegated request did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateError {
    /// The application settled its completion with an error.
    Failed(AppError),
    /// The application panicked while handling the request.
    Panicked(String),
    /// The completion was dropped and no response was committed.
    Abandoned,
}

impl DelegateError {
    /// The underlying message, exposed to clients only in development mode.
    pub fn message(&self) -> &str {
        match self {
            DelegateError::Failed(err) => err.message(),
            DelegateError::Panicked(msg) => msg,
            DelegateError::Abandoned => "request finished without a response",
        }
    }
}

impl fmt::Display for DelegateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegateError::Failed(err) => write!(f, "{err}"),
            DelegateError::Panicked(msg) => write!(f, "handler panicked: {msg}"),
            DelegateError::Abandoned => {
                f.write_str("handler finished without settling or responding")
            }
        }
    }
}

impl std::error::Error for DelegateError {}

/// JSON body written when a delegated request fails before responding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn internal(err: &DelegateError, development: bool) -> Self {
        let message = if development {
            err.message().to_string()
        } else {
            GENERIC_ERROR_MESSAGE.to_string()
        };
        Self {
            error: INTERNAL_SERVER_ERROR.to_string(),
            message,
        }
    }
}

type Settlement = Result<(), AppError>;

/// Creates a pending completion and the signal that observes it.
pub fn completion() -> (Completion, CompletionSignal) {
    let (tx, rx) = oneshot::channel();
    (Completion { tx }, CompletionSignal { rx })
}

/// The settling half handed to the application.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Settlement>,
}

impl Completion {
    pub fn succeed(self) {
        self.settle(Ok(()));
    }

    pub fn fail(self, err: impl Into<AppError>) {
        self.settle(Err(err.into()));
    }

    pub fn settle(self, outcome: Settlement) {
        // The receiver is gone only once the invocation has already responded.
        let _ = self.tx.send(outcome);
    }
}

/// The observing half held by the entry point.
#[derive(Debug)]
pub struct CompletionSignal {
    rx: oneshot::Receiver<Settlement>,
}

impl CompletionSignal {
    pub async fn settled(self) -> Result<(), DelegateError> {
        match self.rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(DelegateError::Failed(err)),
            Err(_) => Err(DelegateError::Abandoned),
        }
    }
}
