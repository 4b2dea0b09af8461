mod tracing_setup;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
};
use clap::Parser;
use tracing::{debug, error, info};

use dualhost::{
    adapters::{LambdaHost, TracingFaultSink},
    application::{Bootstrap, FaultBoundary, FunctionEntry},
    cli::{Cli, Commands, InvokeArgs, StartArgs},
    config::{ConfigOverrides, HostConfig, startup_fault_policy},
    env_file, site,
};
use tracing_setup::LogOutput;

fn main() {
    let cli = Cli::parse();

    // Applied before the runtime exists, while the process is single threaded.
    let env_loaded = env_file::load(cli.env_file.as_deref());

    let output = LogOutput::from_flags(cli.verbose, cli.log_json, cli.pretty);
    let log_dir = cli.file_log_dir();
    let guard = tracing_setup::init(output, cli.verbose, log_dir.as_deref());

    let faults = Arc::new(FaultBoundary::new(
        Arc::new(TracingFaultSink::new()),
        startup_fault_policy(|key| std::env::var(key).ok()),
    ));
    faults.install_process_hooks();

    let outcome = env_loaded.and_then(|path| {
        if let Some(path) = path {
            debug!(path = %path.display(), "loaded env file");
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start tokio runtime")?;
        runtime.block_on(run(cli.command, faults))
    });

    if let Err(err) = outcome {
        error!("Command failed: {err:#}");
        drop(guard);
        std::process::exit(1);
    }
}

async fn run(command: Commands, faults: Arc<FaultBoundary>) -> Result<()> {
    match command {
        Commands::Start(args) => start_command(args, faults).await,
        Commands::Invoke(args) => invoke_command(args, faults).await,
    }
}

async fn start_command(args: StartArgs, faults: Arc<FaultBoundary>) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), &args.overrides())?;
    faults.set_policy(config.fault_policy);
    info!(
        mode = %config.mode,
        development = config.development,
        fault_policy = config.fault_policy.as_str(),
        "resolved host configuration"
    );

    let app = Arc::new(site::application(config.socket_addr()));
    Bootstrap::new(app, Arc::new(LambdaHost::new()), faults)
        .development(config.development)
        .run(config.mode)
        .await?;
    Ok(())
}

async fn invoke_command(args: InvokeArgs, faults: Arc<FaultBoundary>) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), &args.overrides())?;
    faults.set_policy(config.fault_policy);
    let request = build_request(&args)?;

    let app = Arc::new(site::application(config.socket_addr()));
    let entry = FunctionEntry::new(app, faults, config.development);

    let response = entry.invoke(request).await;
    println!("{:?} {}", response.version(), response.status());
    for (name, value) in response.headers() {
        println!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    println!();
    println!("{}", String::from_utf8_lossy(response.body()));
    Ok(())
}

fn resolve_config(
    path: Option<&std::path::Path>,
    overrides: &ConfigOverrides,
) -> Result<HostConfig> {
    let base = match path {
        Some(path) => HostConfig::from_path(path)?,
        None => HostConfig::default(),
    };
    base.with_env(|key| std::env::var(key).ok())?
        .with_overrides(overrides)
}

fn build_request(args: &InvokeArgs) -> Result<Request<Body>> {
    let method = Method::from_bytes(args.method.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", args.method))?;
    let mut builder = Request::builder().method(method).uri(args.path.as_str());
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        builder = builder.header(name, value);
    }
    let body = args.body.clone().map(Body::from).unwrap_or_else(Body::empty);
    builder
        .body(body)
        .with_context(|| format!("Invalid request path '{}'", args.path))
}

fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("Header '{raw}' must look like 'name: value'"))?;
    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .with_context(|| format!("Invalid header name in '{raw}'"))?;
    let value = HeaderValue::from_str(value.trim())
        .with_context(|| format!("Invalid header value in '{raw}'"))?;
    Ok((name, value))
}
