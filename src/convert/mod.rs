//! Field binding and type coercion.
//!
//! Raw field strings become typed values here. [`FieldValue`] is the carrier
//! between rows and record fields, [`BooleanDateTimeParser`] /
//! [`BooleanDateTimeFormatter`] are the injectable strategy pairs for the two
//! types whose text form is genuinely ambiguous, and [`FieldBinder`] applies
//! the coercion precedence ladder. [`read_records`] ties it all together as a
//! lazy iterator from a [`DelimitedReader`] to typed records.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::io::BufRead;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ConvertError, ConvertResult, ReadResult};
use crate::reader::DelimitedReader;
use crate::schema::{
    column_mapping, schema_of, DelimitedRecord, FieldDescriptor, FieldKind, RecordSchema,
};

// =============================================================================
// Field Values
// =============================================================================

/// A single field value in transit between a row and a record.
///
/// `Null` is the absent representation: what an empty optional field binds
/// to, and what serializes back to an empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl FieldValue {
    /// The kind this value already has, if any.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(_) => Some(FieldKind::Bool),
            FieldValue::Byte(_) => Some(FieldKind::Byte),
            FieldValue::Int16(_) => Some(FieldKind::Int16),
            FieldValue::Int32(_) => Some(FieldKind::Int32),
            FieldValue::Int64(_) => Some(FieldKind::Int64),
            FieldValue::Float32(_) => Some(FieldKind::Float32),
            FieldValue::Float64(_) => Some(FieldKind::Float64),
            FieldValue::String(_) => Some(FieldKind::String),
            FieldValue::DateTime(_) => Some(FieldKind::DateTime),
            FieldValue::Uuid(_) => Some(FieldKind::Uuid),
        }
    }

    /// Default textual form; `Null` renders as the empty string.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Bool(v) => v.fmt(f),
            FieldValue::Byte(v) => v.fmt(f),
            FieldValue::Int16(v) => v.fmt(f),
            FieldValue::Int32(v) => v.fmt(f),
            FieldValue::Int64(v) => v.fmt(f),
            FieldValue::Float32(v) => v.fmt(f),
            FieldValue::Float64(v) => v.fmt(f),
            FieldValue::String(v) => f.write_str(v),
            FieldValue::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::Uuid(v) => v.fmt(f),
        }
    }
}

macro_rules! value_conversions {
    ($(($variant:ident, $ty:ty, $into:ident, $into_opt:ident, $target:literal)),+ $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }

            impl From<Option<$ty>> for FieldValue {
                fn from(value: Option<$ty>) -> Self {
                    value.map_or(FieldValue::Null, FieldValue::$variant)
                }
            }

            impl FieldValue {
                /// Extract the inner value, failing on any other kind.
                pub fn $into(self) -> ConvertResult<$ty> {
                    match self {
                        FieldValue::$variant(value) => Ok(value),
                        other => Err(ConvertError::conversion(other.to_text(), $target)),
                    }
                }

                /// Extract the inner value, mapping `Null` to `None`.
                pub fn $into_opt(self) -> ConvertResult<Option<$ty>> {
                    match self {
                        FieldValue::Null => Ok(None),
                        FieldValue::$variant(value) => Ok(Some(value)),
                        other => Err(ConvertError::conversion(other.to_text(), $target)),
                    }
                }
            }
        )+
    };
}

value_conversions!(
    (Bool, bool, into_bool, into_opt_bool, "bool"),
    (Byte, u8, into_byte, into_opt_byte, "u8"),
    (Int16, i16, into_i16, into_opt_i16, "i16"),
    (Int32, i32, into_i32, into_opt_i32, "i32"),
    (Int64, i64, into_i64, into_opt_i64, "i64"),
    (Float32, f32, into_f32, into_opt_f32, "f32"),
    (Float64, f64, into_f64, into_opt_f64, "f64"),
    (String, String, into_string, into_opt_string, "String"),
    (DateTime, NaiveDateTime, into_date_time, into_opt_date_time, "DateTime"),
    (Uuid, Uuid, into_uuid, into_opt_uuid, "Uuid"),
);

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

// =============================================================================
// Parser and Formatter Strategies
// =============================================================================

static TRUTHY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(true|y|yes|1)$").expect("truthy pattern is valid"));

/// Default boolean parse: case-insensitive `true`/`y`/`yes`/`1` are true,
/// everything else (including blank) is false.
pub fn default_boolean(value: &str) -> bool {
    TRUTHY.is_match(value.trim())
}

/// Default date/time parse: `%Y-%m-%d %H:%M:%S`, the ISO `T` form, or a
/// bare date taken as midnight. Locale-independent.
pub fn default_date_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed);
    }
    if let Ok(parsed) = value.parse::<NaiveDateTime>() {
        return Some(parsed);
    }
    value
        .parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Injected string-to-boolean and string-to-date-time parsers.
///
/// Supplied at reader construction, immutable thereafter, shared by every
/// row that reader produces. The date parser returns `None` on rejection;
/// the binder attaches the offending value to the resulting error, which
/// keeps custom closures one-liners.
#[derive(Clone)]
pub struct BooleanDateTimeParser {
    pub boolean: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    pub date_time: Arc<dyn Fn(&str) -> Option<NaiveDateTime> + Send + Sync>,
}

impl Default for BooleanDateTimeParser {
    fn default() -> Self {
        BooleanDateTimeParser {
            boolean: Arc::new(default_boolean),
            date_time: Arc::new(default_date_time),
        }
    }
}

impl BooleanDateTimeParser {
    /// Replace the boolean parser.
    pub fn with_boolean(mut self, parser: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.boolean = Arc::new(parser);
        self
    }

    /// Replace the date/time parser.
    pub fn with_date_time(
        mut self,
        parser: impl Fn(&str) -> Option<NaiveDateTime> + Send + Sync + 'static,
    ) -> Self {
        self.date_time = Arc::new(parser);
        self
    }
}

/// Injected boolean and date/time formatters for the write path.
///
/// Defaults: `bool`'s own string form and `%Y-%m-%d %H:%M:%S`.
#[derive(Clone)]
pub struct BooleanDateTimeFormatter {
    pub boolean: Arc<dyn Fn(bool) -> String + Send + Sync>,
    pub date_time: Arc<dyn Fn(NaiveDateTime) -> String + Send + Sync>,
}

impl Default for BooleanDateTimeFormatter {
    fn default() -> Self {
        BooleanDateTimeFormatter {
            boolean: Arc::new(|value| value.to_string()),
            date_time: Arc::new(|value| value.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl BooleanDateTimeFormatter {
    /// Replace the boolean formatter.
    pub fn with_boolean(
        mut self,
        formatter: impl Fn(bool) -> String + Send + Sync + 'static,
    ) -> Self {
        self.boolean = Arc::new(formatter);
        self
    }

    /// Replace the date/time formatter.
    pub fn with_date_time(
        mut self,
        formatter: impl Fn(NaiveDateTime) -> String + Send + Sync + 'static,
    ) -> Self {
        self.date_time = Arc::new(formatter);
        self
    }
}

// =============================================================================
// Field Binder
// =============================================================================

/// Coerces raw values into a field's semantic type.
#[derive(Clone, Default)]
pub struct FieldBinder {
    parser: BooleanDateTimeParser,
}

impl FieldBinder {
    pub fn new(parser: BooleanDateTimeParser) -> Self {
        FieldBinder { parser }
    }

    /// Coerce `raw` for the field described by `descriptor`.
    ///
    /// Precedence, first match wins:
    /// 1. `Null` stays the absent representation;
    /// 2. a value already of the field's kind passes through (covers the
    ///    optional wrapper too, since optionality is a descriptor flag);
    /// 3. blank text for an optional field becomes absent;
    /// 4. date/time fields go through the configured date parser;
    /// 5. boolean fields go through the configured boolean parser;
    /// 6. anything else is a standard invariant textual parse, failing with
    ///    a type-conversion error.
    pub fn coerce(
        &self,
        descriptor: &FieldDescriptor,
        raw: FieldValue,
    ) -> ConvertResult<FieldValue> {
        if matches!(raw, FieldValue::Null) {
            return Ok(FieldValue::Null);
        }

        if raw.kind() == Some(descriptor.kind) {
            return Ok(raw);
        }

        if descriptor.optional {
            if let FieldValue::String(text) = &raw {
                if text.trim().is_empty() {
                    return Ok(FieldValue::Null);
                }
            }
        }

        let text = raw.to_text();
        match descriptor.kind {
            FieldKind::DateTime => (self.parser.date_time)(&text)
                .map(FieldValue::DateTime)
                .ok_or(ConvertError::DateTime { value: text }),
            FieldKind::Bool => Ok(FieldValue::Bool((self.parser.boolean)(&text))),
            kind => parse_text(kind, &text),
        }
    }
}

/// Standard textual parse into `kind`, trimming surrounding whitespace.
fn parse_text(kind: FieldKind, text: &str) -> ConvertResult<FieldValue> {
    let trimmed = text.trim();
    let failed = || ConvertError::conversion(text, kind.target_name());

    match kind {
        FieldKind::Bool => trimmed
            .parse::<bool>()
            .map(FieldValue::Bool)
            .map_err(|_| failed()),
        FieldKind::Byte => trimmed
            .parse::<u8>()
            .map(FieldValue::Byte)
            .map_err(|_| failed()),
        FieldKind::Int16 => trimmed
            .parse::<i16>()
            .map(FieldValue::Int16)
            .map_err(|_| failed()),
        FieldKind::Int32 => trimmed
            .parse::<i32>()
            .map(FieldValue::Int32)
            .map_err(|_| failed()),
        FieldKind::Int64 => trimmed
            .parse::<i64>()
            .map(FieldValue::Int64)
            .map_err(|_| failed()),
        FieldKind::Float32 => trimmed
            .parse::<f32>()
            .map(FieldValue::Float32)
            .map_err(|_| failed()),
        FieldKind::Float64 => trimmed
            .parse::<f64>()
            .map(FieldValue::Float64)
            .map_err(|_| failed()),
        FieldKind::String => Ok(FieldValue::String(text.to_string())),
        FieldKind::DateTime => default_date_time(text)
            .map(FieldValue::DateTime)
            .ok_or(ConvertError::DateTime {
                value: text.to_string(),
            }),
        FieldKind::Uuid => Uuid::parse_str(trimmed)
            .map(FieldValue::Uuid)
            .map_err(|_| failed()),
    }
}

// =============================================================================
// Record Binding
// =============================================================================

/// Bind every remaining row of `reader` to records of type `T`, lazily.
///
/// The column mapping is resolved once from the reader's header; rows are
/// consumed one `read()` at a time, so the sequence is restartable only via a
/// new reader. Conversion failures surface as `Err` items.
pub fn read_records<R, T>(reader: DelimitedReader<R>) -> Records<R, T>
where
    R: BufRead,
    T: DelimitedRecord + 'static,
{
    let schema = schema_of::<T>();
    let mapping = column_mapping(&schema, reader.column_names());
    let binder = FieldBinder::new(reader.parser().clone());

    Records {
        reader,
        binder,
        schema,
        mapping,
        _marker: PhantomData,
    }
}

/// Lazy iterator over typed records. See [`read_records`].
pub struct Records<R, T> {
    reader: DelimitedReader<R>,
    binder: FieldBinder,
    schema: Arc<RecordSchema>,
    mapping: Vec<(usize, usize)>,
    _marker: PhantomData<T>,
}

impl<R, T> Records<R, T>
where
    R: BufRead,
    T: DelimitedRecord,
{
    fn bind_current(&self) -> ReadResult<T> {
        let mut record = T::default();

        for &(column_index, field_index) in &self.mapping {
            let descriptor = &self.schema.fields()[field_index];
            let raw = FieldValue::String(self.reader.value(column_index).to_string());
            let coerced = self.binder.coerce(descriptor, raw)?;
            record.set_value(descriptor.name, coerced)?;
        }

        Ok(record)
    }
}

impl<R, T> Iterator for Records<R, T>
where
    R: BufRead,
    T: DelimitedRecord,
{
    type Item = ReadResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read() {
            Err(error) => Some(Err(error)),
            Ok(false) => None,
            Ok(true) => Some(self.bind_current()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ReaderOptions;
    use crate::schema::FieldDescriptor;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[derive(Debug, Default, PartialEq)]
    struct Person {
        id: i32,
        name: String,
        date_of_birth: Option<NaiveDateTime>,
    }

    impl DelimitedRecord for Person {
        fn descriptors() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::new("Id", FieldKind::Int32),
                FieldDescriptor::new("Name", FieldKind::String),
                FieldDescriptor::new("DateOfBirth", FieldKind::DateTime).optional(),
            ]
        }

        fn set_value(&mut self, field: &str, value: FieldValue) -> ConvertResult<()> {
            match field {
                "Id" => self.id = value.into_i32()?,
                "Name" => self.name = value.into_string()?,
                "DateOfBirth" => self.date_of_birth = value.into_opt_date_time()?,
                other => return Err(ConvertError::UnknownField(other.into())),
            }
            Ok(())
        }

        fn value(&self, field: &str) -> FieldValue {
            match field {
                "Id" => self.id.into(),
                "Name" => self.name.clone().into(),
                "DateOfBirth" => self.date_of_birth.into(),
                _ => FieldValue::Null,
            }
        }
    }

    #[test]
    fn test_default_boolean_truthy_set() {
        for truthy in ["true", "TRUE", "y", "Y", "yes", "Yes", "1"] {
            assert!(default_boolean(truthy), "{truthy} should be true");
        }
        for falsy in ["false", "n", "no", "0", "", "  ", "2", "truthy"] {
            assert!(!default_boolean(falsy), "{falsy} should be false");
        }
    }

    #[test]
    fn test_default_date_time_forms() {
        let expected = date(2011, 12, 25);
        assert_eq!(default_date_time("2011-12-25"), Some(expected));
        assert_eq!(default_date_time("2011-12-25 00:00:00"), Some(expected));
        assert_eq!(default_date_time("2011-12-25T00:00:00"), Some(expected));
        assert_eq!(default_date_time("not a date"), None);
    }

    #[test]
    fn test_coerce_null_passes_through() {
        let binder = FieldBinder::default();
        let descriptor = FieldDescriptor::new("Id", FieldKind::Int32);
        assert_eq!(
            binder.coerce(&descriptor, FieldValue::Null).unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_coerce_exact_kind_passes_through() {
        let binder = FieldBinder::default();
        let descriptor = FieldDescriptor::new("Id", FieldKind::Int32);
        assert_eq!(
            binder.coerce(&descriptor, FieldValue::Int32(7)).unwrap(),
            FieldValue::Int32(7)
        );
    }

    #[test]
    fn test_coerce_optional_blank_becomes_null() {
        let binder = FieldBinder::default();
        let descriptor = FieldDescriptor::new("When", FieldKind::DateTime).optional();
        assert_eq!(
            binder
                .coerce(&descriptor, FieldValue::String("  ".into()))
                .unwrap(),
            FieldValue::Null
        );
    }

    #[test]
    fn test_coerce_required_blank_fails() {
        let binder = FieldBinder::default();
        let descriptor = FieldDescriptor::new("Id", FieldKind::Int32);
        let error = binder
            .coerce(&descriptor, FieldValue::String("".into()))
            .unwrap_err();
        assert!(matches!(error, ConvertError::Conversion { .. }));
    }

    #[test]
    fn test_coerce_boolean_uses_configured_parser() {
        let binder = FieldBinder::new(
            BooleanDateTimeParser::default().with_boolean(|s| s.trim().eq_ignore_ascii_case("ja")),
        );
        let descriptor = FieldDescriptor::new("Flag", FieldKind::Bool);
        assert_eq!(
            binder
                .coerce(&descriptor, FieldValue::String("ja".into()))
                .unwrap(),
            FieldValue::Bool(true)
        );
        assert_eq!(
            binder
                .coerce(&descriptor, FieldValue::String("yes".into()))
                .unwrap(),
            FieldValue::Bool(false)
        );
    }

    #[test]
    fn test_coerce_numeric_and_uuid_fallback() {
        let binder = FieldBinder::default();

        let int = FieldDescriptor::new("N", FieldKind::Int64);
        assert_eq!(
            binder
                .coerce(&int, FieldValue::String(" -42 ".into()))
                .unwrap(),
            FieldValue::Int64(-42)
        );

        let id = FieldDescriptor::new("Id", FieldKind::Uuid);
        let coerced = binder
            .coerce(
                &id,
                FieldValue::String("67e55044-10b1-426f-9247-bb680e5fe0c8".into()),
            )
            .unwrap();
        assert!(matches!(coerced, FieldValue::Uuid(_)));

        let bad = binder.coerce(&int, FieldValue::String("abc".into()));
        assert_eq!(bad, Err(ConvertError::conversion("abc", "i64")));
    }

    #[test]
    fn test_read_records_binds_by_header_name() {
        let input = "Id,Name,DateOfBirth\n1,Jackie Chan,2011-12-25\n2,Angelina Jolie,";
        let reader =
            DelimitedReader::new(input.as_bytes(), ReaderOptions::default()).unwrap();

        let people: Vec<Person> = read_records(reader).collect::<ReadResult<_>>().unwrap();

        assert_eq!(
            people,
            vec![
                Person {
                    id: 1,
                    name: "Jackie Chan".into(),
                    date_of_birth: Some(date(2011, 12, 25)),
                },
                Person {
                    id: 2,
                    name: "Angelina Jolie".into(),
                    date_of_birth: None,
                },
            ]
        );
    }

    #[test]
    fn test_read_records_case_insensitive_columns() {
        let input = "id,NAME,dateofbirth\n5,Bruce Lee,1940-11-27";
        let reader =
            DelimitedReader::new(input.as_bytes(), ReaderOptions::default()).unwrap();

        let people: Vec<Person> = read_records(reader).collect::<ReadResult<_>>().unwrap();
        assert_eq!(people[0].name, "Bruce Lee");
        assert_eq!(people[0].date_of_birth, Some(date(1940, 11, 27)));
    }

    #[test]
    fn test_read_records_surfaces_conversion_errors() {
        let input = "Id,Name\nnot-a-number,X";
        let reader =
            DelimitedReader::new(input.as_bytes(), ReaderOptions::default()).unwrap();

        let result: ReadResult<Vec<Person>> = read_records(reader).collect();
        assert!(result.is_err());
    }
}
