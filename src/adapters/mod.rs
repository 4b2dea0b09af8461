pub mod inbound;
pub mod outbound;

pub use inbound::lambda::LambdaHost;
pub use inbound::server::RouterApplication;
pub use outbound::telemetry::TracingFaultSink;
