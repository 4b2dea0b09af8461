use std::{net::IpAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{config::ConfigOverrides, core::domain::ExecutionMode};

/// Dualhost CLI: run the bundled web application as a local server or as a
/// serverless function.
#[derive(Debug, Parser)]
#[command(name = "dualhost")]
#[command(about = "Run one web application locally or as a serverless function", version)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Verbose logs (debug level, full format)")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit stdout logs as JSON")]
    pub log_json: bool,

    #[arg(long, global = true, requires = "log_json", help = "Pretty-print JSON logs")]
    pub pretty: bool,

    #[arg(
        long,
        global = true,
        help = "Also write JSON debug logs under $DUALHOST_HOME/.dualhost/logs"
    )]
    pub log_file: bool,

    #[arg(long, global = true, help = "Write JSON debug logs to this directory")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Env file to load (defaults to ./.env)")]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Directory for file logs, if file logging was requested.
    pub fn file_log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| self.log_file.then(crate::paths::log_dir))
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the application in the configured execution mode.
    Start(StartArgs),
    /// Run a single request through the function entry point and print the response.
    Invoke(InvokeArgs),
}

#[derive(Debug, Args, Clone, Default)]
pub struct StartArgs {
    #[arg(long, help = "Optional YAML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Force an execution mode (local, function)")]
    pub mode: Option<ModeArg>,

    #[arg(long, help = "Address to bind in local mode")]
    pub host: Option<IpAddr>,

    #[arg(long, help = "Port to bind in local mode")]
    pub port: Option<u16>,

    #[arg(long, help = "Include error details in function-mode error responses")]
    pub development: bool,
}

impl StartArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mode: self.mode.map(ExecutionMode::from),
            development: self.development,
            host: self.host,
            port: self.port,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct InvokeArgs {
    #[arg(long, help = "Optional YAML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Include error details in error responses")]
    pub development: bool,

    #[arg(long, short = 'X', default_value = "GET", help = "HTTP method")]
    pub method: String,

    #[arg(
        long = "header",
        short = 'H',
        value_name = "NAME: VALUE",
        help = "Request header, repeatable"
    )]
    pub headers: Vec<String>,

    #[arg(long, short = 'd', help = "Request body")]
    pub body: Option<String>,

    #[arg(help = "Request path, e.g. /health")]
    pub path: String,
}

impl InvokeArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mode: Some(ExecutionMode::Function),
            development: self.development,
            ..ConfigOverrides::default()
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[clap(rename_all = "lower")]
pub enum ModeArg {
    Local,
    Function,
}

impl From<ModeArg> for ExecutionMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Local => ExecutionMode::Local,
            ModeArg::Function => ExecutionMode::Function,
        }
    }
}
