//! INSERT statement generation.
//!
//! `build_insert` is pure: the same record, definition and options always
//! produce byte-identical text and values. Clause order is fixed:
//!
//! ```text
//! INSERT INTO <table> (<columns>) VALUES (<?, ...>) [IF NOT EXISTS] [USING TTL ?]
//! ```

use chrono::{DateTime, Utc};

use crate::error::{MapperError, Result};
use crate::mapping::convert::{read_property, to_column_value};
use crate::mapping::definition::MappingDefinition;
use crate::record::PropertySource;
use crate::session::{Consistency, SerialConsistency};
use crate::value::Value;

/// Per-call insert options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOptions {
    /// Include null non-key columns. When false they are left out of both the
    /// column list and the values, so existing cells are not overwritten.
    pub include_nulls: bool,
    pub ttl_seconds: Option<i32>,
    pub if_not_exists: bool,
    /// Write timestamp in microseconds since the epoch.
    pub timestamp: Option<i64>,
    pub consistency: Option<Consistency>,
    pub serial_consistency: Option<SerialConsistency>,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            include_nulls: true,
            ttl_seconds: None,
            if_not_exists: false,
            timestamp: None,
            consistency: None,
            serial_consistency: None,
        }
    }
}

impl InsertOptions {
    /// Defaults: nulls included, no TTL, unconditional.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether null non-key columns are written.
    pub fn include_nulls(mut self, include: bool) -> Self {
        self.include_nulls = include;
        self
    }

    /// Expire the written row after `seconds`.
    pub fn ttl(mut self, seconds: i32) -> Self {
        self.ttl_seconds = Some(seconds);
        self
    }

    /// Make the insert a lightweight transaction.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Write timestamp in microseconds since the epoch.
    pub fn timestamp(mut self, micros: i64) -> Self {
        self.timestamp = Some(micros);
        self
    }

    /// Write timestamp from a point in time.
    pub fn timestamp_at(self, at: DateTime<Utc>) -> Self {
        self.timestamp(at.timestamp_micros())
    }

    /// Consistency for this execution.
    pub fn consistency(mut self, level: Consistency) -> Self {
        self.consistency = Some(level);
        self
    }

    /// Serial consistency for the paxos phase of a conditional insert.
    pub fn serial_consistency(mut self, level: SerialConsistency) -> Self {
        self.serial_consistency = Some(level);
        self
    }
}

/// Statement text plus its positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStatement {
    pub text: String,
    pub values: Vec<Value>,
}

impl GeneratedStatement {
    /// Number of `?` markers in the text.
    pub fn placeholder_count(&self) -> usize {
        self.text.matches('?').count()
    }
}

/// Build the INSERT for one record.
///
/// A primary-key column is always included, even when its value is null;
/// the server decides what to do with a null key.
pub fn build_insert(
    instance: &dyn PropertySource,
    definition: &MappingDefinition,
    options: &InsertOptions,
) -> Result<GeneratedStatement> {
    let mut columns = Vec::with_capacity(definition.columns().len());
    let mut values = Vec::with_capacity(definition.columns().len() + 1);

    for column in definition.columns() {
        let property = read_property(instance, column)?;
        if property.is_null() && !column.is_primary_key && !options.include_nulls {
            continue;
        }
        values.push(to_column_value(property, column, definition)?);
        columns.push(quote(definition, &column.column_name));
    }

    if columns.is_empty() {
        return Err(MapperError::InvalidInsert {
            table: definition.table().to_string(),
        });
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut text = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        table_name(definition),
        columns.join(", "),
    );
    if options.if_not_exists {
        text.push_str(" IF NOT EXISTS");
    }
    if let Some(ttl) = options.ttl_seconds {
        text.push_str(" USING TTL ?");
        values.push(Value::from(ttl));
    }

    Ok(GeneratedStatement { text, values })
}

fn table_name(definition: &MappingDefinition) -> String {
    match definition.keyspace() {
        Some(keyspace) => format!(
            "{}.{}",
            quote(definition, keyspace),
            quote(definition, definition.table())
        ),
        None => quote(definition, definition.table()),
    }
}

fn quote(definition: &MappingDefinition, identifier: &str) -> String {
    if definition.is_case_sensitive() {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    } else {
        identifier.to_string()
    }
}
