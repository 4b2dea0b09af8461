//! Traits at the seams of the execution adapter. The application, the
//! serverless host, and the fault log are all supplied from outside the core.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::Response,
};

use crate::core::{
    domain::Fault,
    error::Result,
    exchange::{Completion, ResponseWriter},
};

/// Inbound request as seen by the application.
pub type Request = axum::http::Request<Body>;

/// The request-handling application wrapped by the adapter.
#[async_trait]
pub trait Application: Send + Sync {
    /// Handle one request.
    ///
    /// Implementations either settle `done` or commit a response through
    /// `response` before dropping `done`.
    async fn handle(&self, request: Request, response: ResponseWriter, done: Completion);

    /// Start accepting connections on the application's own bind address.
    /// Resolves when the server stops.
    async fn start_listening(&self) -> Result<()>;
}

/// The per-request entry point exposed in function mode.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, request: Request) -> Response<Bytes>;
}

/// A serverless runtime that calls an [`Invoker`] once per incoming request.
#[async_trait]
pub trait FunctionHost: Send + Sync {
    async fn serve(&self, invoker: Arc<dyn Invoker>) -> Result<()>;
}

/// Destination for faults captured by the fault boundary.
pub trait FaultSink: Send + Sync {
    fn record(&self, fault: &Fault);
}
