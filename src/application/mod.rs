//! Use cases of the execution adapter: bootstrapping a mode, serving
//! function invocations, and containing process-level faults.

pub mod bootstrap;
pub mod faults;
pub mod invoke;

pub use bootstrap::Bootstrap;
pub use faults::FaultBoundary;
pub use invoke::FunctionEntry;
