//! Record schemas: field descriptors, column binding and write-order
//! resolution.
//!
//! A record type registers its fields once through
//! [`DelimitedRecord::descriptors`], an explicit table that stands in for
//! runtime reflection. From that table [`schema_of`] builds a
//! [`RecordSchema`] and memoizes it in a process-wide cache keyed by type
//! identity; entries are immutable once inserted and never evicted, so
//! concurrent lookups need no coordination and a racing first insert is
//! merely redundant work.
//!
//! Column selection follows the annotation rule: if any descriptor carries a
//! column annotation, only annotated descriptors participate; otherwise every
//! descriptor does, keyed by its field name.

use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::convert::FieldValue;
use crate::error::ConvertResult;

// =============================================================================
// Field Kinds and Descriptors
// =============================================================================

/// The semantic type a field's text coerces into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Byte,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    DateTime,
    Uuid,
}

impl FieldKind {
    /// Name used in conversion error messages.
    pub fn target_name(self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::Byte => "u8",
            FieldKind::Int16 => "i16",
            FieldKind::Int32 => "i32",
            FieldKind::Int64 => "i64",
            FieldKind::Float32 => "f32",
            FieldKind::Float64 => "f64",
            FieldKind::String => "String",
            FieldKind::DateTime => "DateTime",
            FieldKind::Uuid => "Uuid",
        }
    }
}

/// One registered field of a record type.
///
/// Descriptors are declared in field declaration order. A descriptor becomes
/// *annotated* when given an explicit column name or serialization order;
/// annotated descriptors shadow unannotated ones during resolution.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name on the record type.
    pub name: &'static str,
    /// Semantic type of the field.
    pub kind: FieldKind,
    /// Whether the field is an optional wrapper over its kind.
    pub optional: bool,
    /// Explicit column name; the field name is used when unset.
    pub column: Option<&'static str>,
    /// Serialization order. Positive values only; 0 means unset.
    pub order: u32,
    /// Whether this field carries a column annotation.
    pub annotated: bool,
}

impl FieldDescriptor {
    /// A plain, unannotated descriptor.
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        FieldDescriptor {
            name,
            kind,
            optional: false,
            column: None,
            order: 0,
            annotated: false,
        }
    }

    /// Mark the field as an optional wrapper (blank input becomes absent).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Annotate with an explicit column name.
    pub fn with_column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self.annotated = true;
        self
    }

    /// Annotate with an explicit serialization order (positive; 0 is unset).
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self.annotated = true;
        self
    }

    /// The column name this field binds to.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }
}

// =============================================================================
// Record Trait
// =============================================================================

/// A record type that can be bound to and from delimited rows.
///
/// Implementations register their fields once in `descriptors` and route
/// values by field name in `set_value`/`value`. A fresh instance is created
/// per row via `Default`.
pub trait DelimitedRecord: Default {
    /// The field descriptor table, in declaration order.
    fn descriptors() -> Vec<FieldDescriptor>;

    /// Set the named field from a coerced value.
    fn set_value(&mut self, field: &str, value: FieldValue) -> ConvertResult<()>;

    /// Read the named field; unknown names yield [`FieldValue::Null`].
    fn value(&self, field: &str) -> FieldValue;
}

// =============================================================================
// Resolved Schema
// =============================================================================

/// A record type's descriptors plus its resolved serialization order.
#[derive(Debug)]
pub struct RecordSchema {
    fields: Vec<FieldDescriptor>,
    write_order: Vec<usize>,
}

impl RecordSchema {
    fn build(fields: Vec<FieldDescriptor>) -> Self {
        let write_order = resolve_write_order(&fields);
        RecordSchema {
            fields,
            write_order,
        }
    }

    /// All descriptors, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Participating descriptors in serialization order.
    pub fn write_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.write_order.iter().map(|&i| &self.fields[i])
    }
}

/// Indices of participating fields, sorted for serialization.
///
/// The sort key is (order, declaration index): explicit orders ascend, and
/// unset orders (0) fall back to declaration position ahead of them.
fn resolve_write_order(fields: &[FieldDescriptor]) -> Vec<usize> {
    let mut indices: Vec<usize> = participating(fields).collect();
    indices.sort_by_key(|&i| (fields[i].order, i));
    indices
}

/// Declaration-order indices of the fields that take part in binding:
/// annotated fields only when any exist, otherwise all fields.
fn participating(fields: &[FieldDescriptor]) -> impl Iterator<Item = usize> + '_ {
    let any_annotated = fields.iter().any(|f| f.annotated);
    fields
        .iter()
        .enumerate()
        .filter(move |(_, f)| !any_annotated || f.annotated)
        .map(|(i, _)| i)
}

// =============================================================================
// Schema Cache
// =============================================================================

/// Process-wide schema cache. Entries are write-once and never evicted;
/// distinct record types form a small static set, so the map stays bounded.
static SCHEMA_CACHE: Lazy<RwLock<HashMap<TypeId, Arc<RecordSchema>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The memoized [`RecordSchema`] for `T`.
///
/// The first call per type builds the schema from `T::descriptors()`;
/// concurrent first calls may both build it, and whichever inserts first
/// wins. Entries are write-once, so a poisoned lock still holds valid data
/// and is simply recovered.
pub fn schema_of<T: DelimitedRecord + 'static>() -> Arc<RecordSchema> {
    let key = TypeId::of::<T>();

    if let Some(schema) = SCHEMA_CACHE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&key)
    {
        return Arc::clone(schema);
    }

    let schema = Arc::new(RecordSchema::build(T::descriptors()));
    let mut cache = SCHEMA_CACHE.write().unwrap_or_else(|e| e.into_inner());
    Arc::clone(cache.entry(key).or_insert(schema))
}

// =============================================================================
// Read-Side Column Mapping
// =============================================================================

/// Join a schema against a concrete column-name list.
///
/// Returns `(column_index, field_index)` pairs for every participating field
/// whose column name matches a supplied column, case-insensitively. Fields
/// without a matching column are dropped, not an error. Duplicate column
/// names after case folding resolve last-wins.
pub fn column_mapping(schema: &RecordSchema, columns: &[String]) -> Vec<(usize, usize)> {
    let mut by_name: HashMap<String, usize> = HashMap::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        by_name.insert(column.to_lowercase(), index);
    }

    let fields = schema.fields();
    participating(fields)
        .filter_map(|field_index| {
            let column = fields[field_index].column_name().to_lowercase();
            by_name
                .get(&column)
                .map(|&column_index| (column_index, field_index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain {
        int_value: i32,
        string_value: String,
    }

    impl DelimitedRecord for Plain {
        fn descriptors() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::new("IntValue", FieldKind::Int32),
                FieldDescriptor::new("StringValue", FieldKind::String),
            ]
        }

        fn set_value(&mut self, field: &str, value: FieldValue) -> ConvertResult<()> {
            match field {
                "IntValue" => self.int_value = value.into_i32()?,
                "StringValue" => self.string_value = value.into_string()?,
                other => return Err(crate::error::ConvertError::UnknownField(other.into())),
            }
            Ok(())
        }

        fn value(&self, field: &str) -> FieldValue {
            match field {
                "IntValue" => self.int_value.into(),
                "StringValue" => self.string_value.clone().into(),
                _ => FieldValue::Null,
            }
        }
    }

    fn annotated_fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("IntValue", FieldKind::Int32).with_column("Int"),
            FieldDescriptor::new("StringValue", FieldKind::String).with_column("String"),
            FieldDescriptor::new("DateTimeValue", FieldKind::DateTime),
        ]
    }

    fn ordered_fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new("IntValue", FieldKind::Int32).with_order(4),
            FieldDescriptor::new("StringValue", FieldKind::String).with_order(3),
            FieldDescriptor::new("DateTimeValue", FieldKind::DateTime).with_order(2),
            FieldDescriptor::new("BooleanValue", FieldKind::Bool).with_order(1),
        ]
    }

    #[test]
    fn test_unannotated_type_uses_all_fields_in_declaration_order() {
        let schema = RecordSchema::build(Plain::descriptors());
        let names: Vec<_> = schema.write_fields().map(|f| f.column_name()).collect();
        assert_eq!(names, vec!["IntValue", "StringValue"]);
    }

    #[test]
    fn test_annotated_fields_shadow_unannotated() {
        let schema = RecordSchema::build(annotated_fields());
        let names: Vec<_> = schema.write_fields().map(|f| f.column_name()).collect();
        assert_eq!(names, vec!["Int", "String"]);
    }

    #[test]
    fn test_explicit_order_sorts_ascending() {
        let schema = RecordSchema::build(ordered_fields());
        let names: Vec<_> = schema.write_fields().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec!["BooleanValue", "DateTimeValue", "StringValue", "IntValue"]
        );
    }

    #[test]
    fn test_unset_order_falls_back_to_declaration_position() {
        let fields = vec![
            FieldDescriptor::new("A", FieldKind::String).with_order(2),
            FieldDescriptor::new("B", FieldKind::String).with_column("B"),
            FieldDescriptor::new("C", FieldKind::String).with_order(1),
        ];
        let schema = RecordSchema::build(fields);
        let names: Vec<_> = schema.write_fields().map(|f| f.name).collect();
        // unset (0) precedes explicit orders; ties break on declaration index
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_column_mapping_case_insensitive() {
        let schema = RecordSchema::build(Plain::descriptors());
        let columns = vec!["intvalue".to_string(), "STRINGVALUE".to_string()];
        let mut mapping = column_mapping(&schema, &columns);
        mapping.sort_unstable();
        assert_eq!(mapping, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_column_mapping_drops_unmatched_fields() {
        let schema = RecordSchema::build(annotated_fields());
        let columns = vec![
            "String".to_string(),
            "DateTime".to_string(),
            "Int".to_string(),
        ];
        let mut mapping = column_mapping(&schema, &columns);
        mapping.sort_unstable();
        // DateTimeValue is unannotated and excluded; DateTime column unused
        assert_eq!(mapping, vec![(0, 1), (2, 0)]);
    }

    #[test]
    fn test_column_mapping_duplicate_columns_last_wins() {
        let schema = RecordSchema::build(Plain::descriptors());
        let columns = vec![
            "IntValue".to_string(),
            "intvalue".to_string(),
            "StringValue".to_string(),
        ];
        let mut mapping = column_mapping(&schema, &columns);
        mapping.sort_unstable();
        assert_eq!(mapping, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_schema_cache_returns_same_instance() {
        let first = schema_of::<Plain>();
        let second = schema_of::<Plain>();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
