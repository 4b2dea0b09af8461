pub mod domain;
pub mod error;
pub mod exchange;
pub mod ports;

pub use domain::*;
pub use error::{Error, Result};
