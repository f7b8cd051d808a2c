//! Line-by-line reader for delimited text sources.
//!
//! [`DelimitedReader`] wraps any [`BufRead`] source and walks it one record
//! per physical line. Construction bootstraps header state from the first
//! line (real column names, or synthesized `Column0..ColumnN-1` names when no
//! header row is configured) and keeps exactly one line of lookahead, so
//! end-of-source is known without consuming past the current row.
//!
//! The reader owns its cursor exclusively; it is not meant to be shared
//! across concurrent callers, and once a line is consumed it cannot be
//! revisited.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::convert::BooleanDateTimeParser;
use crate::error::{ConvertError, ReadError, ReadResult};
use crate::tokenizer::Tokenizer;

// =============================================================================
// Options
// =============================================================================

/// Reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Column delimiter. Must be non-empty.
    pub delimiter: String,

    /// Optional text qualifier. `None` means fields are never qualified.
    pub qualifier: Option<String>,

    /// Whether the first physical line carries column names.
    pub has_header_row: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            delimiter: ",".to_string(),
            qualifier: None,
            has_header_row: true,
        }
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Stateful cursor over a delimited text source.
pub struct DelimitedReader<R> {
    source: R,
    tokenizer: Tokenizer,
    parser: BooleanDateTimeParser,
    has_header_row: bool,
    columns: Vec<String>,
    ordinals: HashMap<String, usize>,
    current: Option<Vec<String>>,
    next_line: Option<String>,
    records_read: usize,
}

impl DelimitedReader<BufReader<File>> {
    /// Open a file and read it with the given options.
    pub fn from_path(path: impl AsRef<Path>, options: ReaderOptions) -> ReadResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), options)
    }
}

impl<R: BufRead> DelimitedReader<R> {
    /// Build a reader with the default boolean/date-time parsers.
    pub fn new(source: R, options: ReaderOptions) -> ReadResult<Self> {
        Self::with_parser(source, options, BooleanDateTimeParser::default())
    }

    /// Build a reader with custom boolean/date-time parsers.
    ///
    /// Fails with a configuration error on an empty delimiter and with an
    /// empty-source error when a header row is expected but the source has
    /// no content. Header column names are trimmed of surrounding
    /// whitespace; without a header row the first line stays in the
    /// lookahead and is itself the first data row.
    pub fn with_parser(
        mut source: R,
        options: ReaderOptions,
        parser: BooleanDateTimeParser,
    ) -> ReadResult<Self> {
        let tokenizer = Tokenizer::new(&options.delimiter, options.qualifier.as_deref())?;

        let first_line = read_line(&mut source)?;
        if options.has_header_row && first_line.as_deref().map_or(true, |l| l.trim().is_empty()) {
            return Err(ReadError::EmptySource);
        }

        let mut reader = DelimitedReader {
            source,
            tokenizer,
            parser,
            has_header_row: options.has_header_row,
            columns: Vec::new(),
            ordinals: HashMap::new(),
            current: None,
            next_line: None,
            records_read: 0,
        };

        if let Some(line) = first_line {
            let tokens = reader.tokenizer.split(&line);

            if reader.has_header_row {
                reader.columns = tokens.iter().map(|name| name.trim().to_string()).collect();
                reader.next_line = read_line(&mut reader.source)?;
            } else {
                reader.columns = (0..tokens.len()).map(|i| format!("Column{i}")).collect();
                reader.next_line = Some(line);
            }

            // later duplicates overwrite earlier ones: last write wins
            reader.ordinals = reader
                .columns
                .iter()
                .enumerate()
                .map(|(index, name)| (name.to_lowercase(), index))
                .collect();
        }

        Ok(reader)
    }

    /// Advance to the next row.
    ///
    /// Returns `Ok(false)` when the source is exhausted. A row whose field
    /// count differs from the header-declared count fails with a
    /// malformed-row error carrying the 1-based physical line number and the
    /// raw line; the reader does not skip and continue.
    pub fn read(&mut self) -> ReadResult<bool> {
        let Some(line) = self.next_line.take() else {
            self.current = None;
            return Ok(false);
        };

        let tokens = self.tokenizer.split(&line);
        if tokens.len() != self.columns.len() {
            let line_number = self.records_read + if self.has_header_row { 2 } else { 1 };
            return Err(ReadError::MalformedRow {
                line: line_number,
                data: line,
            });
        }

        self.records_read += 1;
        self.current = Some(tokens);
        self.next_line = read_line(&mut self.source)?;
        Ok(true)
    }

    /// Number of columns declared by the header (or the first line).
    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of data rows successfully read so far.
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// All column names, in column order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Name of the column at `index`.
    pub fn column_name(&self, index: usize) -> &str {
        &self.columns[index]
    }

    /// Case-insensitive column lookup.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.ordinals.get(&name.to_lowercase()).copied()
    }

    /// The configured boolean/date-time parsers.
    pub fn parser(&self) -> &BooleanDateTimeParser {
        &self.parser
    }

    /// The current row's raw fields.
    ///
    /// # Panics
    ///
    /// Panics when no current row exists: before the first `read()`, or
    /// after `read()` returned `Ok(false)`. Callers must check `read()`'s
    /// return value first.
    pub fn row(&self) -> &[String] {
        self.current
            .as_deref()
            .expect("no current row: call read() and check its result first")
    }

    /// Raw text of the field at `index` in the current row.
    pub fn value(&self, index: usize) -> &str {
        &self.row()[index]
    }

    /// A field is null if and only if it is the empty string.
    pub fn is_null(&self, index: usize) -> bool {
        self.value(index).is_empty()
    }

    /// The field as a string slice; same as [`Self::value`].
    pub fn get_string(&self, index: usize) -> &str {
        self.value(index)
    }

    /// The field through the configured boolean parser. Never fails; the
    /// default parser maps anything outside its truthy set to false.
    pub fn get_bool(&self, index: usize) -> bool {
        (self.parser.boolean)(self.value(index))
    }

    /// The field through the configured date/time parser.
    pub fn get_date_time(&self, index: usize) -> ReadResult<NaiveDateTime> {
        let value = self.value(index);
        (self.parser.date_time)(value).ok_or_else(|| {
            ConvertError::DateTime {
                value: value.to_string(),
            }
            .into()
        })
    }

    /// The field parsed as a UUID.
    pub fn get_uuid(&self, index: usize) -> ReadResult<Uuid> {
        let value = self.value(index);
        Uuid::parse_str(value.trim()).map_err(|_| ConvertError::conversion(value, "Uuid").into())
    }

    pub fn get_byte(&self, index: usize) -> ReadResult<u8> {
        self.parse_field(index, "u8")
    }

    pub fn get_i16(&self, index: usize) -> ReadResult<i16> {
        self.parse_field(index, "i16")
    }

    pub fn get_i32(&self, index: usize) -> ReadResult<i32> {
        self.parse_field(index, "i32")
    }

    pub fn get_i64(&self, index: usize) -> ReadResult<i64> {
        self.parse_field(index, "i64")
    }

    pub fn get_f32(&self, index: usize) -> ReadResult<f32> {
        self.parse_field(index, "f32")
    }

    pub fn get_f64(&self, index: usize) -> ReadResult<f64> {
        self.parse_field(index, "f64")
    }

    /// Text sources carry no binary fields; this always fails.
    pub fn get_bytes(&self, _index: usize) -> ReadResult<Vec<u8>> {
        Err(ReadError::Unsupported("binary field access"))
    }

    /// Bind the remaining rows to typed records. Consumes the reader; the
    /// sequence is restartable only via a new reader.
    pub fn records<T>(self) -> crate::convert::Records<R, T>
    where
        T: crate::schema::DelimitedRecord + 'static,
    {
        crate::convert::read_records(self)
    }

    fn parse_field<T: FromStr>(&self, index: usize, target: &'static str) -> ReadResult<T> {
        let value = self.value(index);
        value
            .trim()
            .parse()
            .map_err(|_| ConvertError::conversion(value, target).into())
    }
}

/// Read one line, stripping the trailing `\n` or `\r\n`. `None` at EOF.
fn read_line<R: BufRead>(source: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if source.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Some(line))
}
