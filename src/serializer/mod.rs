//! Record serialization to delimited text lines.
//!
//! The write path mirrors the read path: resolved write order comes from the
//! same schema the binder uses, values render through the configured
//! boolean/date-time formatters, and the qualification policy decides which
//! fields get wrapped in the qualifier (doubling internal qualifier
//! occurrences). Header column names are subject to the same policy as data.

use serde::{Deserialize, Serialize};

use crate::convert::{BooleanDateTimeFormatter, FieldValue};
use crate::error::{ConfigError, SerializeResult};
use crate::schema::{schema_of, DelimitedRecord, RecordSchema};

// =============================================================================
// Options
// =============================================================================

/// Serializer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializerOptions {
    /// Column delimiter. Must be non-empty.
    pub delimiter: String,

    /// Optional text qualifier. `None` means fields are never qualified.
    pub qualifier: Option<String>,

    /// Qualify a field only when its rendered value contains the delimiter.
    /// Without this flag, every field is qualified once a qualifier is set.
    pub qualify_only_required: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        SerializerOptions {
            delimiter: ",".to_string(),
            qualifier: None,
            qualify_only_required: false,
        }
    }
}

// =============================================================================
// Serializer
// =============================================================================

/// Turns records into delimited text lines.
pub struct DelimitedSerializer {
    options: SerializerOptions,
    formatter: BooleanDateTimeFormatter,
}

impl DelimitedSerializer {
    /// Build a serializer with the default boolean/date-time formatters.
    pub fn new(options: SerializerOptions) -> SerializeResult<Self> {
        Self::with_formatter(options, BooleanDateTimeFormatter::default())
    }

    /// Build a serializer with custom boolean/date-time formatters.
    pub fn with_formatter(
        options: SerializerOptions,
        formatter: BooleanDateTimeFormatter,
    ) -> SerializeResult<Self> {
        if options.delimiter.is_empty() {
            return Err(ConfigError::EmptyDelimiter.into());
        }
        Ok(DelimitedSerializer { options, formatter })
    }

    /// The header line for `T`: write-ordered column names.
    pub fn header_row<T: DelimitedRecord + 'static>(&self) -> String {
        let schema = schema_of::<T>();
        let names: Vec<String> = schema
            .write_fields()
            .map(|field| self.encode(field.column_name()))
            .collect();
        names.join(&self.options.delimiter)
    }

    /// One record as one delimited line.
    pub fn line<T: DelimitedRecord + 'static>(&self, record: &T) -> String {
        let schema = schema_of::<T>();
        self.record_line(&schema, record)
    }

    /// Lazily serialize `records`, emitting the header line first when
    /// `include_header` is set.
    pub fn lines<'a, T, I>(
        &'a self,
        records: I,
        include_header: bool,
    ) -> impl Iterator<Item = String> + 'a
    where
        T: DelimitedRecord + 'static,
        I: IntoIterator<Item = &'a T>,
        I::IntoIter: 'a,
    {
        let schema = schema_of::<T>();
        let header = include_header.then(|| self.header_row::<T>());

        header.into_iter().chain(
            records
                .into_iter()
                .map(move |record| self.record_line(&schema, record)),
        )
    }

    /// Qualify and join untyped string fields into one line.
    pub fn raw_line<I, S>(&self, fields: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let encoded: Vec<String> = fields
            .into_iter()
            .map(|field| self.encode(field.as_ref()))
            .collect();
        encoded.join(&self.options.delimiter)
    }

    fn record_line<T: DelimitedRecord>(&self, schema: &RecordSchema, record: &T) -> String {
        let values: Vec<String> = schema
            .write_fields()
            .map(|field| self.encode(&self.render(record.value(field.name))))
            .collect();
        values.join(&self.options.delimiter)
    }

    /// Render a value to text: null is empty, booleans and date-times go
    /// through the configured formatters, everything else uses its default
    /// string form.
    fn render(&self, value: FieldValue) -> String {
        match value {
            FieldValue::Null => String::new(),
            FieldValue::Bool(flag) => (self.formatter.boolean)(flag),
            FieldValue::DateTime(when) => (self.formatter.date_time)(when),
            other => other.to_text(),
        }
    }

    /// Apply the qualification policy to one rendered field.
    fn encode(&self, value: &str) -> String {
        let Some(qualifier) = self.options.qualifier.as_deref().filter(|q| !q.is_empty())
        else {
            return value.to_string();
        };

        if self.options.qualify_only_required && !value.contains(&self.options.delimiter) {
            return value.to_string();
        }

        let doubled = format!("{qualifier}{qualifier}");
        let escaped = value.replace(qualifier, &doubled);
        format!("{qualifier}{escaped}{qualifier}")
    }
}
