//! Common utilities shared between the harness CLI and the stub API

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
