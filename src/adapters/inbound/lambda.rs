//! Serverless host adapter built on the Lambda runtime API, which is also
//! the protocol spoken by Vercel's Rust runtime.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use lambda_http::{
    Body as LambdaBody, Request as LambdaRequest, Response as LambdaResponse, service_fn,
};
use tokio::runtime::Handle;
use tracing::info;

use crate::core::{
    error::{Error, Result},
    ports::{FunctionHost, Invoker, Request},
};

/// Variables the runtime client reads at startup. It panics when one is
/// missing, so they are checked up front.
pub const RUNTIME_ENV_VARS: &[&str] = &[
    "AWS_LAMBDA_RUNTIME_API",
    "AWS_LAMBDA_FUNCTION_NAME",
    "AWS_LAMBDA_FUNCTION_MEMORY_SIZE",
    "AWS_LAMBDA_FUNCTION_VERSION",
];

/// Pulls invocations from the runtime API and hands each to the invoker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LambdaHost;

impl LambdaHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FunctionHost for LambdaHost {
    async fn serve(&self, invoker: Arc<dyn Invoker>) -> Result<()> {
        check_runtime_env(|key| std::env::var(key).ok())?;
        info!("waiting for function invocations");

        // The runtime loop future is not `Send`, so it is driven on a
        // blocking thread that stays inside this runtime.
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || handle.block_on(run_loop(invoker)))
            .await
            .map_err(|err| Error::Host(format!("function runtime stopped abnormally: {err}")))?
    }
}

async fn run_loop(invoker: Arc<dyn Invoker>) -> Result<()> {
    lambda_http::run(service_fn(move |event: LambdaRequest| {
        let invoker = Arc::clone(&invoker);
        async move {
            let response = invoke_event(invoker.as_ref(), event).await;
            Ok::<_, lambda_http::Error>(response)
        }
    }))
    .await
    .map_err(|err| Error::Host(err.to_string()))
}

fn check_runtime_env<F>(lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let missing: Vec<&str> = RUNTIME_ENV_VARS
        .iter()
        .copied()
        .filter(|key| lookup(key).is_none_or(|value| value.trim().is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Host(format!(
            "function runtime environment incomplete, missing {}",
            missing.join(", ")
        )));
    }
    if let Some(memory) = lookup("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")
        && memory.trim().parse::<i32>().is_err()
    {
        return Err(Error::Host(format!(
            "AWS_LAMBDA_FUNCTION_MEMORY_SIZE must be an integer, got '{memory}'"
        )));
    }
    Ok(())
}

async fn invoke_event(invoker: &dyn Invoker, event: LambdaRequest) -> LambdaResponse<LambdaBody> {
    let (parts, body) = event.into_parts();
    let request = Request::from_parts(parts, Body::from(body.to_vec()));
    let (parts, bytes) = invoker.invoke(request).await.into_parts();
    LambdaResponse::from_parts(parts, lambda_body(bytes))
}

fn lambda_body(bytes: Bytes) -> LambdaBody {
    if bytes.is_empty() {
        return LambdaBody::Empty;
    }
    match std::str::from_utf8(&bytes) {
        Ok(text) => LambdaBody::Text(text.to_owned()),
        Err(_) => LambdaBody::Binary(bytes.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::to_bytes,
        http::{Response, StatusCode},
    };

    /// Echoes method, path and body so conversions can be checked end to end.
    struct EchoInvoker;

    #[async_trait]
    impl Invoker for EchoInvoker {
        async fn invoke(&self, request: Request) -> Response<Bytes> {
            let (parts, body) = request.into_parts();
            let body = to_bytes(body, usize::MAX).await.unwrap();
            let text = format!(
                "{} {} {}",
                parts.method,
                parts.uri.path(),
                String::from_utf8_lossy(&body)
            );
            Response::builder()
                .status(StatusCode::ACCEPTED)
                .header("x-echo", "1")
                .body(Bytes::from(text))
                .unwrap()
        }
    }

    #[tokio::test]
    async fn event_round_trips_through_invoker() {
        let event = lambda_http::http::Request::builder()
            .method("POST")
            .uri("https://example.com/api/login")
            .body(LambdaBody::from("code=abc"))
            .unwrap();

        let response = invoke_event(&EchoInvoker, event).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-echo"], "1");
        assert!(matches!(
            response.body(),
            LambdaBody::Text(text) if text == "POST /api/login code=abc"
        ));
    }

    #[test]
    fn binary_bodies_stay_binary() {
        let body = lambda_body(Bytes::from_static(&[0xff, 0xfe, 0x00]));
        assert!(matches!(body, LambdaBody::Binary(ref bytes) if bytes == &[0xff, 0xfe, 0x00]));
    }

    fn runtime_env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| {
            vars.iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        }
    }

    #[test]
    fn complete_runtime_env_passes() {
        let lookup = runtime_env(&[
            ("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001"),
            ("AWS_LAMBDA_FUNCTION_NAME", "site"),
            ("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "1024"),
            ("AWS_LAMBDA_FUNCTION_VERSION", "$LATEST"),
        ]);
        assert!(check_runtime_env(lookup).is_ok());
    }

    #[test]
    fn missing_runtime_env_is_a_host_error() {
        let lookup = runtime_env(&[
            ("AWS_LAMBDA_FUNCTION_NAME", "site"),
            ("AWS_LAMBDA_FUNCTION_VERSION", " "),
        ]);
        let err = check_runtime_env(lookup).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, Error::Host(_)));
        assert!(message.contains("AWS_LAMBDA_RUNTIME_API"));
        assert!(message.contains("AWS_LAMBDA_FUNCTION_MEMORY_SIZE"));
        assert!(message.contains("AWS_LAMBDA_FUNCTION_VERSION"));
        assert!(!message.contains("AWS_LAMBDA_FUNCTION_NAME"));
    }

    #[test]
    fn non_numeric_memory_size_is_rejected() {
        let lookup = runtime_env(&[
            ("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001"),
            ("AWS_LAMBDA_FUNCTION_NAME", "site"),
            ("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "1GB"),
            ("AWS_LAMBDA_FUNCTION_VERSION", "1"),
        ]);
        assert!(check_runtime_env(lookup).unwrap_err().to_string().contains("1GB"));
    }

    #[test]
    fn empty_body_maps_to_empty() {
        assert!(matches!(lambda_body(Bytes::new()), LambdaBody::Empty));
    }
}
