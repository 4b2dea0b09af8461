//! Inbound adapters deliver requests to the application: a local HTTP
//! listener and a serverless runtime loop.

pub mod lambda;
pub mod server;
pub mod signals;
