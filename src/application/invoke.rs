//! Function-mode entry point. Every inbound request is delegated to the
//! application and any failure is converted into a fixed JSON 500 response,
//! unless the application already started responding.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{Method, Response, StatusCode, Uri},
};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    application::faults::{self, FaultBoundary, panic_message},
    core::{
        exchange::{
            CompletionSignal, DelegateError, ErrorBody, ResponseError, ResponseWriter, completion,
        },
        ports::{Application, Invoker, Request},
    },
};

pub struct FunctionEntry {
    app: Arc<dyn Application>,
    faults: Arc<FaultBoundary>,
    development: bool,
}

impl FunctionEntry {
    pub fn new(app: Arc<dyn Application>, faults: Arc<FaultBoundary>, development: bool) -> Self {
        Self {
            app,
            faults,
            development,
        }
    }

    /// Handles one request. Never fails: delegate errors end up in the
    /// returned response.
    pub async fn invoke(&self, request: Request) -> Response<Bytes> {
        let invocation_id = Uuid::new_v4();
        let method = request.method().clone();
        let uri = request.uri().clone();
        debug!(%invocation_id, %method, %uri, "invocation received");

        let response = ResponseWriter::new();
        let (done, signal) = completion();
        let app = Arc::clone(&self.app);
        let writer = response.clone();
        let delegate = tokio::spawn(faults::track(invocation_id, async move {
            app.handle(request, writer, done).await;
        }));

        match self
            .await_delegate(invocation_id, signal, delegate, &response)
            .await
        {
            Ok(()) => debug!(%invocation_id, status = %response.status(), "invocation completed"),
            Err(err) => self.respond_with_error(invocation_id, &method, &uri, &response, &err),
        }

        response.to_response()
    }

    async fn await_delegate(
        &self,
        invocation_id: Uuid,
        signal: CompletionSignal,
        delegate: JoinHandle<()>,
        response: &ResponseWriter,
    ) -> Result<(), DelegateError> {
        match signal.settled().await {
            Err(DelegateError::Abandoned) => match delegate.await {
                Err(err) if err.is_panic() => Err(DelegateError::Panicked(panic_message(
                    err.into_panic().as_ref(),
                ))),
                // Responding without settling counts as handled.
                _ if response.headers_sent() => Ok(()),
                _ => Err(DelegateError::Abandoned),
            },
            settled => {
                self.faults.watch(invocation_id, delegate);
                settled
            }
        }
    }

    fn respond_with_error(
        &self,
        invocation_id: Uuid,
        method: &Method,
        uri: &Uri,
        response: &ResponseWriter,
        err: &DelegateError,
    ) {
        error!(%invocation_id, %method, %uri, error = %err, "function invocation failed");

        let body = ErrorBody::internal(err, self.development);
        match response.json(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            Ok(()) => {}
            Err(ResponseError::HeadersSent) => {
                warn!(%invocation_id, "response already started; error body not written");
            }
            Err(write_err) => {
                error!(%invocation_id, error = %write_err, "failed to write error response");
            }
        }
    }
}

#[async_trait]
impl Invoker for FunctionEntry {
    async fn invoke(&self, request: Request) -> Response<Bytes> {
        FunctionEntry::invoke(self, request).await
    }
}
