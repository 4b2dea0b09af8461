//! Drives `LambdaHost::serve` against an in-process runtime API. Sets the
//! runtime environment variables, so it lives in its own test binary.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
};
use dualhost::{
    adapters::{LambdaHost, TracingFaultSink},
    application::{FaultBoundary, FunctionEntry},
    core::{FaultPolicy, error::Error, ports::FunctionHost},
    site,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const REQUEST_ID: &str = "8476a536-e9f4-11e8-9739-2dfe598c3fcd";

#[derive(Default)]
struct RuntimeApi {
    polls: AtomicUsize,
    responses: Mutex<Vec<(String, Value)>>,
}

fn health_event() -> Value {
    json!({
        "version": "2.0",
        "routeKey": "$default",
        "rawPath": "/health",
        "rawQueryString": "",
        "headers": {
            "accept": "*/*",
            "host": "site.example.com",
            "user-agent": "curl/8.5.0"
        },
        "isBase64Encoded": false,
        "requestContext": {
            "accountId": "123456789012",
            "apiId": "site",
            "domainName": "site.example.com",
            "domainPrefix": "site",
            "http": {
                "method": "GET",
                "path": "/health",
                "protocol": "HTTP/1.1",
                "sourceIp": "127.0.0.1",
                "userAgent": "curl/8.5.0"
            },
            "requestId": "JKJaXmPLvHcESHA=",
            "routeKey": "$default",
            "stage": "$default",
            "time": "06/May/2020:22:36:55 +0000",
            "timeEpoch": 1588804615616u64
        }
    })
}

async fn next_event(State(api): State<Arc<RuntimeApi>>) -> (HeaderMap, Json<Value>) {
    let mut headers = HeaderMap::new();
    headers.insert(
        "lambda-runtime-deadline-ms",
        HeaderValue::from_static("4102444800000"),
    );
    headers.insert(
        "lambda-runtime-invoked-function-arn",
        HeaderValue::from_static("arn:aws:lambda:us-east-1:123456789012:function:site"),
    );
    if api.polls.fetch_add(1, Ordering::SeqCst) == 0 {
        headers.insert(
            "lambda-runtime-aws-request-id",
            HeaderValue::from_static(REQUEST_ID),
        );
    } else {
        // An unreadable request id makes the runtime loop return an error,
        // which ends `serve`.
        headers.insert(
            "lambda-runtime-aws-request-id",
            HeaderValue::from_bytes(b"\xff").unwrap(),
        );
    }
    (headers, Json(health_event()))
}

async fn record_response(
    State(api): State<Arc<RuntimeApi>>,
    Path(id): Path<String>,
    body: Bytes,
) -> StatusCode {
    // The runtime client posts JSON without a content type.
    let body: Value = serde_json::from_slice(&body).unwrap();
    api.responses.lock().unwrap().push((id, body));
    StatusCode::ACCEPTED
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serve_answers_runtime_events_through_function_entry() -> anyhow::Result<()> {
    let api = Arc::new(RuntimeApi::default());
    let router = Router::new()
        .route("/2018-06-01/runtime/invocation/next", get(next_event))
        .route(
            "/2018-06-01/runtime/invocation/{id}/response",
            post(record_response),
        )
        .with_state(Arc::clone(&api));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let runtime_api = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, router).await });

    unsafe {
        std::env::set_var("AWS_LAMBDA_RUNTIME_API", runtime_api.to_string());
        std::env::set_var("AWS_LAMBDA_FUNCTION_NAME", "site");
        std::env::set_var("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "128");
        std::env::set_var("AWS_LAMBDA_FUNCTION_VERSION", "$LATEST");
    }

    let faults = Arc::new(FaultBoundary::new(
        Arc::new(TracingFaultSink::new()),
        FaultPolicy::Continue,
    ));
    let app = Arc::new(site::application("127.0.0.1:0".parse()?));
    let entry = Arc::new(FunctionEntry::new(app, faults, false));

    let outcome = tokio::time::timeout(Duration::from_secs(10), LambdaHost::new().serve(entry))
        .await
        .expect("runtime loop should stop after the unreadable event");

    assert!(matches!(outcome, Err(Error::Host(_))), "{outcome:?}");

    let responses = api.responses.lock().unwrap().clone();
    assert_eq!(responses.len(), 1);
    let (id, body) = &responses[0];
    assert_eq!(id, REQUEST_ID);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["body"], "ok");
    assert_eq!(api.polls.load(Ordering::SeqCst), 2);
    Ok(())
}
