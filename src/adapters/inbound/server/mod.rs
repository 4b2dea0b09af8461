//! HTTP server inbound adapter: serves an axum router locally and lets the
//! function entry point drive the same router one request at a time.

use std::{any::Any, future::Future, net::SocketAddr};

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::to_bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

use crate::{
    adapters::inbound::signals::wait_for_shutdown,
    application::faults::panic_message,
    core::{
        error::{Error, Result},
        exchange::{AppError, Completion, DelegateError, ErrorBody, ResponseWriter},
        ports::{Application, Request},
    },
};

/// Largest response body buffered when the router runs in function mode.
const MAX_BUFFERED_BODY: usize = 16 * 1024 * 1024;

/// Application handle backed by an axum [`Router`].
#[derive(Clone)]
pub struct RouterApplication {
    router: Router,
    addr: SocketAddr,
}

impl RouterApplication {
    pub fn new(router: Router, addr: SocketAddr) -> Self {
        Self { router, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve on an existing listener until `shutdown` resolves (useful for tests).
    ///
    /// A route that panics answers 500 and the listener keeps serving.
    pub async fn run_with_listener<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "dualhost listening");
        } else {
            info!("dualhost listening");
        }
        let router = self
            .router
            .clone()
            .layer(CatchPanicLayer::custom(panic_response));
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| Error::Serve(err.to_string()))?;
        info!("dualhost server stopped");
        Ok(())
    }

    async fn route(
        &self,
        request: Request,
        response: &ResponseWriter,
    ) -> std::result::Result<(), AppError> {
        let routed = match self.router.clone().oneshot(request).await {
            Ok(routed) => routed,
            Err(never) => match never {},
        };
        let (parts, body) = routed.into_parts();
        let bytes = to_bytes(body, MAX_BUFFERED_BODY)
            .await
            .map_err(|err| AppError::new(format!("failed to read response body: {err}")))?;
        response.send(parts.status, parts.headers, bytes)?;
        Ok(())
    }
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let err = DelegateError::Panicked(panic_message(payload.as_ref()));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::internal(&err, false)),
    )
        .into_response()
}

#[async_trait]
impl Application for RouterApplication {
    async fn handle(&self, request: Request, response: ResponseWriter, done: Completion) {
        let outcome = self.route(request, &response).await;
        done.settle(outcome);
    }

    async fn start_listening(&self) -> Result<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|err| Error::Bind {
                addr: self.addr.to_string(),
                details: err.to_string(),
            })?;
        self.run_with_listener(listener, wait_for_shutdown()).await
    }
}
