//! Session collaborator contract.
//!
//! The mapper never talks to the wire itself. A driver adapter implements
//! [`Session`]; the mapper hands it statement text to prepare and bound
//! statements to execute.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::value::{FromValue, Value};

/// Read/write consistency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

/// Consistency of the paxos phase of a lightweight transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum SerialConsistency {
    Serial,
    LocalSerial,
}

/// Server-side prepared statement handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    /// Driver-assigned statement id.
    pub id: Vec<u8>,
    pub cql: String,
}

impl PreparedStatement {
    pub fn new(id: impl Into<Vec<u8>>, cql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cql: cql.into(),
        }
    }

    /// Attach positional values to this handle.
    pub fn bind(self: &Arc<Self>, values: Vec<Value>) -> BoundStatement {
        BoundStatement {
            prepared: Arc::clone(self),
            values,
            timestamp: None,
            consistency: None,
            serial_consistency: None,
        }
    }
}

/// Prepared statement plus values and execution attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub prepared: Arc<PreparedStatement>,
    pub values: Vec<Value>,
    /// Write timestamp in microseconds since the epoch.
    pub timestamp: Option<i64>,
    pub consistency: Option<Consistency>,
    pub serial_consistency: Option<SerialConsistency>,
}

impl BoundStatement {
    pub fn cql(&self) -> &str {
        &self.prepared.cql
    }

    pub fn with_timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_consistency(mut self, consistency: Option<Consistency>) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_serial_consistency(mut self, serial: Option<SerialConsistency>) -> Self {
        self.serial_consistency = serial;
        self
    }
}

/// One result row: named columns in server order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Typed access. `Ok(None)` for an absent or null column.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<Option<T>, String> {
        match self.get_value(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => T::from_value(v.clone()).map(Some),
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn into_columns(self) -> Vec<(String, Value)> {
        self.columns
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Rows returned by an execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Driver session the mapper prepares and executes through.
///
/// Errors are opaque to the mapper and surfaced to the caller annotated with
/// the statement text.
#[async_trait]
pub trait Session: Send + Sync {
    async fn prepare(&self, cql: &str) -> anyhow::Result<PreparedStatement>;

    async fn execute(&self, statement: BoundStatement) -> anyhow::Result<RowSet>;
}
