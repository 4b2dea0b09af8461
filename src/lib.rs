#![warn(clippy::uninlined_format_args)]

pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod core;
pub mod env_file;
pub mod paths;
pub mod site;

pub use cli::{Cli, Commands};
