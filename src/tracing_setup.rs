//! Subscriber wiring for the binary: one stdout layer picked from the CLI
//! flags and an optional JSON file layer for post-mortem debugging.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Targets, fmt, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "dualhost.log";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// How events are rendered on stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutput {
    /// Level and message only.
    Plain,
    /// Timestamps and targets, for `-v`.
    Full,
    Json,
    /// One indented JSON document per event.
    PrettyJson,
}

impl LogOutput {
    pub fn from_flags(verbose: bool, log_json: bool, pretty: bool) -> Self {
        match (log_json, pretty, verbose) {
            (true, true, _) => Self::PrettyJson,
            (true, false, _) => Self::Json,
            (false, _, true) => Self::Full,
            (false, _, false) => Self::Plain,
        }
    }
}

/// Installs the global subscriber. Keep the returned guard alive until exit,
/// otherwise buffered file events are lost.
pub fn init(output: LogOutput, verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let (file, guard) = match log_dir.map(file_layer).transpose() {
        Ok(Some((layer, guard))) => (Some(layer), Some(guard)),
        Ok(None) => (None, None),
        Err(err) => {
            eprintln!("Warning: file logging disabled: {err}");
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(file)
        .with(stdout_layer(output).with_filter(filter))
        .init();
    guard
}

fn stdout_layer<S>(output: LogOutput) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    match output {
        LogOutput::Plain => Box::new(
            fmt::layer()
                .with_writer(io::stdout)
                .without_time()
                .with_target(false),
        ),
        LogOutput::Full => Box::new(fmt::layer().with_writer(io::stdout)),
        LogOutput::Json => Box::new(fmt::layer().json().with_writer(io::stdout)),
        LogOutput::PrettyJson => Box::new(
            fmt::layer()
                .json()
                .with_writer(|| IndentingWriter::new(io::stdout())),
        ),
    }
}

/// Daily-rolling JSON file in `dir` that captures every DEBUG event,
/// whatever the stdout filter says.
fn file_layer(dir: &Path) -> io::Result<(BoxedLayer<Registry>, WorkerGuard)> {
    fs::create_dir_all(dir).map_err(|err| {
        io::Error::new(err.kind(), format!("cannot create {}: {err}", dir.display()))
    })?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .json()
        .with_writer(writer)
        .with_filter(Targets::new().with_default(Level::DEBUG));
    Ok((Box::new(layer), guard))
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "dualhost=debug,lambda_runtime=info,hyper=warn,info"
    } else {
        "dualhost=info,lambda_runtime=warn,warn"
    }
}

/// Re-indents JSON events; anything that is not a JSON object passes through.
struct IndentingWriter<W> {
    inner: W,
}

impl<W: Write> IndentingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for IndentingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // The JSON formatter hands over exactly one event per call.
        let event = std::str::from_utf8(buf)
            .ok()
            .map(str::trim)
            .filter(|text| text.starts_with('{'))
            .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok());
        match event {
            Some(event) => {
                serde_json::to_writer_pretty(&mut self.inner, &event)?;
                self.inner.write_all(b"\n")?;
                Ok(buf.len())
            }
            None => self.inner.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
