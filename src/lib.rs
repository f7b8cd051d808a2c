//! # Delimitext - delimited text codec
//!
//! Delimitext converts between flat delimited text (CSV-like, with a
//! configurable delimiter and optional text qualifier) and typed records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Text source │────▶│  Tokenizer  │────▶│ FieldBinder │────▶│Typed record │
//! │ (lines)     │     │ (qualifier  │     │ (coercion)  │     │ (schema)    │
//! └─────────────┘     │  + escapes) │     └─────────────┘     └─────────────┘
//!                     └─────────────┘            ▲                   │
//!                                                │    write path     ▼
//!                     ┌──────────────────────────┴───────────[ Serializer ]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use delimitext::{DelimitedReader, ReaderOptions};
//!
//! let mut reader = DelimitedReader::from_path("people.csv", ReaderOptions::default())?;
//! while reader.read()? {
//!     println!("{}: {}", reader.get_i32(0)?, reader.value(1));
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - per-component error types
//! - [`tokenizer`] - line splitting with qualifier handling
//! - [`schema`] - field descriptors, record trait, column mapping
//! - [`convert`] - type coercion and record binding
//! - [`reader`] - line-by-line reader with header state
//! - [`serializer`] - records back to delimited lines

// Core modules
pub mod error;
pub mod tokenizer;

// Schema and binding
pub mod convert;
pub mod schema;

// Reading
pub mod reader;

// Writing
pub mod serializer;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConvertError, ConvertResult, ReadError, ReadResult, SerializeError,
    SerializeResult,
};

// =============================================================================
// Re-exports - Tokenizer
// =============================================================================

pub use tokenizer::Tokenizer;

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    column_mapping, schema_of, DelimitedRecord, FieldDescriptor, FieldKind, RecordSchema,
};

// =============================================================================
// Re-exports - Conversion
// =============================================================================

pub use convert::{
    read_records, BooleanDateTimeFormatter, BooleanDateTimeParser, FieldBinder, FieldValue,
    Records,
};

// =============================================================================
// Re-exports - Reader
// =============================================================================

pub use reader::{DelimitedReader, ReaderOptions};

// =============================================================================
// Re-exports - Serializer
// =============================================================================

pub use serializer::{DelimitedSerializer, SerializerOptions};
