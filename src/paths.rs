use std::path::PathBuf;

/// Base directory for local state: `$DUALHOST_HOME`, then the user's home.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("DUALHOST_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .or_else(|| std::env::var_os("USERPROFILE"))
                .map(PathBuf::from)
        })
}

/// Returns the data directory (`<home>/.dualhost`, or `./.dualhost` without a home).
pub fn data_dir() -> PathBuf {
    if let Some(mut dir) = home_dir() {
        dir.push(".dualhost");
        dir
    } else {
        PathBuf::from(".dualhost")
    }
}

/// Default directory for file logs.
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}
