//! Minimal dotenv support: `KEY=value` lines applied to the process
//! environment without overriding variables that are already set.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

pub const DEFAULT_ENV_FILE: &str = ".env";

/// Loads `path`, or `./.env` when no path is given.
///
/// A missing default file is not an error; a missing explicit file is.
/// Returns the path that was applied, if any. Call it before any other
/// thread is started: it mutates the process environment.
pub fn load(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let (candidate, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };
    match fs::read_to_string(&candidate) {
        Ok(contents) => {
            apply_env_contents(&contents);
            Ok(Some(candidate))
        }
        Err(err) if err.kind() == ErrorKind::NotFound && !explicit => Ok(None),
        Err(err) => Err(err)
            .with_context(|| format!("Failed to read env file at {}", candidate.display())),
    }
}

/// Applies every assignment in `contents` whose key is not already set.
pub fn apply_env_contents(contents: &str) -> usize {
    let mut applied = 0;
    for line in contents.lines() {
        if let Some((key, value)) = parse_env_assignment(line)
            && std::env::var_os(&key).is_none()
        {
            // SAFETY: `load` runs before the async runtime and its threads exist.
            unsafe {
                std::env::set_var(&key, &value);
            }
            applied += 1;
        }
    }
    applied
}

pub fn parse_env_assignment(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim();

    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    Some((key.to_string(), unquote(value.trim())))
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }
    trimmed.to_string()
}
