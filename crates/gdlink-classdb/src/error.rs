//! Error types for gdlink-classdb

use thiserror::Error;

/// Class database error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("{class} names unknown parent {parent}")]
    UnknownParent { class: String, parent: String },

    #[error("{0} method specs disagree with the API manifest")]
    ManifestMismatch(usize),

    #[error("Class already registered: {0}")]
    DuplicateClass(String),

    #[error("{class} overrides {name}, which no ancestor declares")]
    UnknownVirtual { class: String, name: String },

    #[error("Class not registered: {0}")]
    UnregisteredClass(String),

    #[error("inherited override {name} needs {class} state the subclass does not expose")]
    MissingBaseState { class: String, name: String },

    #[error("Cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("Core error: {0}")]
    Core(#[from] gdlink_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
