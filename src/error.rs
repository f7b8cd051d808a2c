//! Error types for the delimited-text codec.
//!
//! Each component has its own error enum:
//!
//! - [`ConfigError`] - invalid delimiter/qualifier configuration
//! - [`ConvertError`] - type coercion failures
//! - [`ReadError`] - reading and row validation failures
//! - [`SerializeError`] - serializer configuration failures
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across component boundaries. Errors are raised
//! synchronously at the point of detection and never retried or logged
//! internally; surfacing and recovery belong to the caller.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid delimiter/qualifier configuration, detected at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The column delimiter is empty or missing.
    #[error("delimiter is required")]
    EmptyDelimiter,
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// A field value could not be coerced to its target type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConvertError {
    /// Generic string-to-type conversion failed.
    #[error("cannot convert '{value}' to {target}")]
    Conversion { value: String, target: &'static str },

    /// The configured date/time parser rejected the value.
    #[error("cannot parse '{value}' as a date/time")]
    DateTime { value: String },

    /// The record type has no field with this name.
    #[error("record has no field named '{0}'")]
    UnknownField(String),
}

impl ConvertError {
    /// Shorthand for a failed conversion of `value` into `target`.
    pub fn conversion(value: impl Into<String>, target: &'static str) -> Self {
        ConvertError::Conversion {
            value: value.into(),
            target,
        }
    }
}

// =============================================================================
// Read Errors
// =============================================================================

/// Errors while reading delimited text.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Invalid reader configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A header row was expected but the source has no content.
    #[error("the source is empty")]
    EmptySource,

    /// A data row's field count does not match the header-declared count.
    #[error("malformed row (line: {line}, data: {data})")]
    MalformedRow { line: usize, data: String },

    /// The underlying source failed.
    #[error("failed to read from source: {0}")]
    Io(#[from] std::io::Error),

    /// A field value could not be coerced to the requested type.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The operation does not apply to text sources.
    #[error("{0} is not supported for text sources")]
    Unsupported(&'static str),
}

// =============================================================================
// Serialization Errors
// =============================================================================

/// Errors while serializing records to delimited text.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Invalid serializer configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for coercion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Result type for read operations.
pub type ReadResult<T> = Result<T, ReadError>;

/// Result type for serialization operations.
pub type SerializeResult<T> = Result<T, SerializeError>;
