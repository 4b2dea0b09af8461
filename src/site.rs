//! The web application bundled with the binary. Its routes stand in for the
//! real site; the adapter only sees it through [`crate::core::ports::Application`].

use std::net::SocketAddr;

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};

use crate::adapters::inbound::server::RouterApplication;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Banner {
    pub service: String,
    pub version: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
}

pub fn application(addr: SocketAddr) -> RouterApplication {
    RouterApplication::new(router(), addr)
}

async fn index() -> Json<Banner> {
    Json(Banner {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn health() -> &'static str {
    "ok"
}
