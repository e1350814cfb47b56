//! Error types for gdlink-classes

use thiserror::Error;

/// Wrapper-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connecting to signal {signal} failed with engine error {code}")]
    Connect { signal: String, code: i64 },

    #[error("Emitting signal {signal} failed with engine error {code}")]
    Emit { signal: String, code: i64 },

    #[error("Cannot read config file {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ClassDB error: {0}")]
    ClassDb(#[from] gdlink_classdb::Error),

    #[error("Core error: {0}")]
    Core(#[from] gdlink_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
