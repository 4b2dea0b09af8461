use std::fmt;

use serde::{Deserialize, Serialize};

/// How the process exposes the application. Resolved once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Long-running server bound to the configured address.
    #[default]
    Local,
    /// Per-request serverless function; no listening socket.
    Function,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Local => "local",
            ExecutionMode::Function => "function",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens after a panic escapes every tracked invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Log and keep the process running.
    Continue,
    /// Log and exit so the supervisor restarts the process.
    #[default]
    Terminate,
}

impl FaultPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultPolicy::Continue => "continue",
            FaultPolicy::Terminate => "terminate",
        }
    }

    pub fn from_name(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Some(FaultPolicy::Continue),
            "terminate" => Some(FaultPolicy::Terminate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Asynchronous work failed after nobody was left to observe it.
    UnhandledRejection,
    /// A panic outside any tracked invocation.
    UncaughtPanic,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::UnhandledRejection => f.write_str("unhandled_rejection"),
            FaultKind::UncaughtPanic => f.write_str("uncaught_panic"),
        }
    }
}

/// A process-level failure captured by the fault boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub location: Option<String>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Decision returned by the fault boundary for a reported fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    Continue,
    Terminate(i32),
}
