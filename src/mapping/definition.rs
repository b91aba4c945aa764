//! Resolved column mapping for a record type.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::value::Scalar;

/// Identity of a record type.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// CQL type of a mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Uuid,
    Timestamp,
    Date,
    Blob,
    List(Box<ColumnType>),
    Set(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    /// User defined type, mapped by another record type.
    Udt(TypeKey),
}

impl ColumnType {
    pub fn list(element: ColumnType) -> Self {
        ColumnType::List(Box::new(element))
    }

    pub fn set(element: ColumnType) -> Self {
        ColumnType::Set(Box::new(element))
    }

    pub fn map(key: ColumnType, value: ColumnType) -> Self {
        ColumnType::Map(Box::new(key), Box::new(value))
    }

    pub fn udt<T: 'static>() -> Self {
        ColumnType::Udt(TypeKey::of::<T>())
    }

    /// UDT types referenced anywhere inside this type.
    pub(crate) fn udt_keys(&self, out: &mut Vec<TypeKey>) {
        match self {
            ColumnType::Udt(key) => out.push(*key),
            ColumnType::List(inner) | ColumnType::Set(inner) => inner.udt_keys(out),
            ColumnType::Map(k, v) => {
                k.udt_keys(out);
                v.udt_keys(out);
            }
            _ => {}
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Boolean => f.write_str("boolean"),
            ColumnType::Int => f.write_str("int"),
            ColumnType::BigInt => f.write_str("bigint"),
            ColumnType::Float => f.write_str("float"),
            ColumnType::Double => f.write_str("double"),
            ColumnType::Decimal => f.write_str("decimal"),
            ColumnType::Text => f.write_str("text"),
            ColumnType::Uuid => f.write_str("uuid"),
            ColumnType::Timestamp => f.write_str("timestamp"),
            ColumnType::Date => f.write_str("date"),
            ColumnType::Blob => f.write_str("blob"),
            ColumnType::List(inner) => write!(f, "list<{inner}>"),
            ColumnType::Set(inner) => write!(f, "set<{inner}>"),
            ColumnType::Map(k, v) => write!(f, "map<{k}, {v}>"),
            ColumnType::Udt(key) => write!(f, "frozen<{}>", key.name()),
        }
    }
}

/// Custom per-column conversion, applied to every scalar leaf of the
/// column's value before it is coerced to the column type.
pub trait ValueConverter: Send + Sync {
    fn to_column(&self, value: Scalar) -> Result<Scalar, String>;

    fn from_column(&self, value: Scalar) -> Result<Scalar, String>;
}

type ConvertFn = dyn Fn(Scalar) -> Result<Scalar, String> + Send + Sync;

/// Converter built from a pair of closures.
pub struct FnConverter {
    to: Box<ConvertFn>,
    from: Box<ConvertFn>,
}

impl FnConverter {
    pub fn new<To, From>(to: To, from: From) -> Self
    where
        To: Fn(Scalar) -> Result<Scalar, String> + Send + Sync + 'static,
        From: Fn(Scalar) -> Result<Scalar, String> + Send + Sync + 'static,
    {
        Self {
            to: Box::new(to),
            from: Box::new(from),
        }
    }
}

impl ValueConverter for FnConverter {
    fn to_column(&self, value: Scalar) -> Result<Scalar, String> {
        (self.to)(value)
    }

    fn from_column(&self, value: Scalar) -> Result<Scalar, String> {
        (self.from)(value)
    }
}

/// One property-to-column mapping.
#[derive(Clone)]
pub struct ColumnMapping {
    pub property_key: String,
    pub column_name: String,
    pub column_type: ColumnType,
    pub converter: Option<Arc<dyn ValueConverter>>,
    pub is_primary_key: bool,
}

impl ColumnMapping {
    pub fn new(
        property_key: impl Into<String>,
        column_name: impl Into<String>,
        column_type: ColumnType,
    ) -> Self {
        Self {
            property_key: property_key.into(),
            column_name: column_name.into(),
            column_type,
            converter: None,
            is_primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = Some(converter);
        self
    }
}

impl fmt::Debug for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMapping")
            .field("property_key", &self.property_key)
            .field("column_name", &self.column_name)
            .field("column_type", &self.column_type)
            .field("converter", &self.converter.is_some())
            .field("is_primary_key", &self.is_primary_key)
            .finish()
    }
}

/// Column mapping for one record type.
///
/// Column order is fixed at construction. Nested UDT definitions are filled
/// in by the registry when the definition is resolved.
#[derive(Debug, Clone)]
pub struct MappingDefinition {
    type_key: TypeKey,
    keyspace: Option<String>,
    table: String,
    case_sensitive: bool,
    columns: Vec<ColumnMapping>,
    nested: HashMap<TypeKey, Arc<MappingDefinition>>,
}

impl MappingDefinition {
    pub fn new<T: 'static>(table: impl Into<String>, columns: Vec<ColumnMapping>) -> Self {
        Self {
            type_key: TypeKey::of::<T>(),
            keyspace: None,
            table: table.into(),
            case_sensitive: false,
            columns,
            nested: HashMap::new(),
        }
    }

    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Quote identifiers in generated statements and match row columns
    /// exactly.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Resolved definition of a UDT referenced by one of the columns.
    pub fn nested(&self, key: &TypeKey) -> Option<&Arc<MappingDefinition>> {
        self.nested.get(key)
    }

    /// UDT types referenced by the columns, in column order, deduplicated.
    pub(crate) fn referenced_udts(&self) -> Vec<TypeKey> {
        let mut keys = Vec::new();
        for column in &self.columns {
            column.column_type.udt_keys(&mut keys);
        }
        let mut seen = HashSet::new();
        keys.retain(|k| seen.insert(*k));
        keys
    }

    pub(crate) fn with_nested(mut self, nested: HashMap<TypeKey, Arc<MappingDefinition>>) -> Self {
        self.nested = nested;
        self
    }

    /// Checks every definition must pass, table or UDT.
    pub(crate) fn validate_columns(&self) -> Result<(), String> {
        if self.columns.is_empty() {
            return Err("no columns mapped".into());
        }
        let mut names = HashSet::new();
        for column in &self.columns {
            let name = if self.case_sensitive {
                column.column_name.clone()
            } else {
                column.column_name.to_lowercase()
            };
            if !names.insert(name) {
                return Err(format!("column '{}' mapped twice", column.column_name));
            }
        }
        Ok(())
    }

    /// Additional checks for a definition used as an insert target.
    pub(crate) fn validate_table(&self) -> Result<(), String> {
        if self.table.trim().is_empty() {
            return Err("table name is empty".into());
        }
        if self.primary_key_columns().next().is_none() {
            return Err("no primary key column".into());
        }
        Ok(())
    }
}
