use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// Host configuration could not be resolved.
    Config(String),
    /// The local listener could not be bound.
    Bind { addr: String, details: String },
    /// The local server stopped with an error after it was bound.
    Serve(String),
    /// The serverless host runtime failed.
    Host(String),
    /// The requested operation is invalid in the current state.
    InvalidState(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Bind { addr, details } => {
                write!(f, "Failed to bind listener on {addr}: {details}")
            }
            Error::Serve(msg) => write!(f, "Server error: {msg}"),
            Error::Host(msg) => write!(f, "Function host error: {msg}"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
