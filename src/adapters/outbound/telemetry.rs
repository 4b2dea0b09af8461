use tracing::error;

use crate::core::{domain::Fault, ports::FaultSink};

/// Writes captured faults to the `dualhost::faults` tracing target.
#[derive(Debug, Default)]
pub struct TracingFaultSink;

impl TracingFaultSink {
    pub fn new() -> Self {
        Self
    }
}

impl FaultSink for TracingFaultSink {
    fn record(&self, fault: &Fault) {
        error!(
            target: "dualhost::faults",
            kind = %fault.kind,
            location = fault.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            fault.message
        );
    }
}
