//! Error types for gdlink-core

use crate::interface::CallErrorKind;
use crate::variant::VariantType;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Interface symbol not provided by the engine: {0}")]
    MissingSymbol(String),

    #[error("Engine returned no method bind for {class}.{method} (hash {hash})")]
    NullMethodBind {
        class: String,
        method: String,
        hash: i64,
    },

    #[error("Method not in the method table: {class}.{method}")]
    MethodNotFound { class: String, method: String },

    #[error("Call to {method} failed: {kind:?} (argument {argument}, expected {expected})")]
    Call {
        method: String,
        kind: CallErrorKind,
        argument: i32,
        expected: i32,
    },

    #[error("Type error: expected {expected:?}, got {got:?}")]
    TypeMismatch {
        expected: VariantType,
        got: VariantType,
    },

    #[error("Variant type has no native conversion: {0:?}")]
    Unsupported(VariantType),

    #[error("Null object handle")]
    NullObject,

    #[error("Invalid UTF-8 in engine string")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Config parse error: {0}")]
    Config(#[from] ron::error::SpannedError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
