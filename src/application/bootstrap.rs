//! Single entry point that starts the application in the selected
//! execution mode.

use std::sync::Arc;

use tracing::info;

use crate::{
    application::{faults::FaultBoundary, invoke::FunctionEntry},
    core::{
        domain::ExecutionMode,
        error::Result,
        ports::{Application, FunctionHost, Invoker},
    },
};

/// Wires one application to either a local listener or a function host.
pub struct Bootstrap {
    app: Arc<dyn Application>,
    host: Arc<dyn FunctionHost>,
    faults: Arc<FaultBoundary>,
    development: bool,
}

impl Bootstrap {
    pub fn new(
        app: Arc<dyn Application>,
        host: Arc<dyn FunctionHost>,
        faults: Arc<FaultBoundary>,
    ) -> Self {
        Self {
            app,
            host,
            faults,
            development: false,
        }
    }

    /// Expose underlying error messages in function-mode error bodies.
    pub fn development(mut self, enabled: bool) -> Self {
        self.development = enabled;
        self
    }

    /// The function-mode entry point for this application.
    pub fn function_entry(&self) -> FunctionEntry {
        FunctionEntry::new(
            Arc::clone(&self.app),
            Arc::clone(&self.faults),
            self.development,
        )
    }

    /// Runs until the server stops (local) or the host stops delivering
    /// invocations (function). Exactly one of the two is ever started.
    /// Failures are returned unlogged; the caller reports them once.
    pub async fn run(&self, mode: ExecutionMode) -> Result<()> {
        match mode {
            ExecutionMode::Local => {
                info!("starting application locally");
                self.app.start_listening().await
            }
            ExecutionMode::Function => {
                info!(
                    development = self.development,
                    "exposing function entry point"
                );
                let entry: Arc<dyn Invoker> = Arc::new(self.function_entry());
                self.host.serve(entry).await
            }
        }
    }
}
