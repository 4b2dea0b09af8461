use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{Router, routing::get};
use dualhost::{
    adapters::{RouterApplication, TracingFaultSink},
    application::{Bootstrap, FaultBoundary},
    core::{
        FaultPolicy,
        error::Result as HostResult,
        ports::{FunctionHost, Invoker},
    },
    site,
};
use tokio::{net::TcpListener, sync::oneshot};

/// A host that must never be asked to serve in local mode.
struct UnusedHost;

#[async_trait]
impl FunctionHost for UnusedHost {
    async fn serve(&self, _invoker: Arc<dyn Invoker>) -> HostResult<()> {
        panic!("function host started in local mode");
    }
}

async fn free_addr() -> SocketAddr {
    let spare = TcpListener::bind("127.0.0.1:0").await.unwrap();
    spare.local_addr().unwrap()
}

async fn get_with_retry(url: &str) -> reqwest::Response {
    for _ in 0..50 {
        if let Ok(response) = reqwest::get(url).await {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server at {url} never came up");
}

#[tokio::test]
async fn local_mode_serves_site_over_tcp() -> anyhow::Result<()> {
    let addr = free_addr().await;
    let faults = Arc::new(FaultBoundary::new(
        Arc::new(TracingFaultSink::new()),
        FaultPolicy::Continue,
    ));
    let bootstrap = Bootstrap::new(
        Arc::new(site::application(addr)),
        Arc::new(UnusedHost),
        faults,
    );
    let server = tokio::spawn(async move {
        bootstrap
            .run(dualhost::core::ExecutionMode::Local)
            .await
    });

    let response = get_with_retry(&format!("http://{addr}/")).await;
    assert_eq!(response.status(), 200);
    let banner: serde_json::Value = response.json().await?;
    assert_eq!(banner["service"], "dualhost");

    let missing = reqwest::get(format!("http://{addr}/missing")).await?;
    assert_eq!(missing.status(), 404);

    server.abort();
    Ok(())
}

#[tokio::test]
async fn handler_errors_pass_through_unchanged_locally() -> anyhow::Result<()> {
    let router = Router::new().route(
        "/teapot",
        get(|| async { (axum::http::StatusCode::IM_A_TEAPOT, "short and stout") }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = RouterApplication::new(router, addr);
    let (stop, stopped) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        app.run_with_listener(listener, async {
            let _ = stopped.await;
        })
        .await
    });

    let response = reqwest::get(format!("http://{addr}/teapot")).await?;
    assert_eq!(response.status(), 418);
    assert_eq!(response.text().await?, "short and stout");

    stop.send(()).unwrap();
    server.await??;
    Ok(())
}
