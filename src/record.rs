//! Record capabilities used in place of runtime reflection.
//!
//! A record exposes its properties through [`PropertySource`] for statement
//! building, and rebuilds itself from a [`PropertyBag`] through [`Poco`] when a
//! conditional insert reports the row that already exists.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{MapperError, Result};
use crate::value::{list_from_value, map_from_value, FromValue, Scalar, Value};

/// Raw property value as read from a record, before column conversion.
pub enum PropertyValue<'a> {
    Null,
    Scalar(Scalar),
    /// Nested record mapped to a UDT column.
    Record(&'a dyn PropertySource),
    List(Vec<PropertyValue<'a>>),
    Map(Vec<(PropertyValue<'a>, PropertyValue<'a>)>),
}

impl<'a> PropertyValue<'a> {
    /// Non-null scalar property.
    pub fn scalar(v: impl Into<Scalar>) -> Self {
        PropertyValue::Scalar(v.into())
    }

    /// `None` maps to `Null`.
    pub fn opt<T: Into<Scalar>>(v: Option<T>) -> Self {
        v.map_or(PropertyValue::Null, |v| PropertyValue::Scalar(v.into()))
    }

    /// Nested record for a UDT column.
    pub fn record(r: &'a dyn PropertySource) -> Self {
        PropertyValue::Record(r)
    }

    pub fn opt_record<R: PropertySource>(r: Option<&'a R>) -> Self {
        r.map_or(PropertyValue::Null, |r| PropertyValue::Record(r))
    }

    /// List or set elements, in the order the record yields them.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = PropertyValue<'a>>,
    {
        PropertyValue::List(items.into_iter().collect())
    }

    /// `None` maps to `Null`, an empty collection stays an empty list.
    pub fn opt_list<I>(items: Option<I>) -> Self
    where
        I: IntoIterator<Item = PropertyValue<'a>>,
    {
        items.map_or(PropertyValue::Null, Self::list)
    }

    /// Map entries, in the order the record yields them.
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (PropertyValue<'a>, PropertyValue<'a>)>,
    {
        PropertyValue::Map(entries.into_iter().collect())
    }

    /// `None` maps to `Null`, an empty collection stays an empty map.
    pub fn opt_map<I>(entries: Option<I>) -> Self
    where
        I: IntoIterator<Item = (PropertyValue<'a>, PropertyValue<'a>)>,
    {
        entries.map_or(PropertyValue::Null, Self::map)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Scalar(s) => s.type_name(),
            PropertyValue::Record(_) => "record",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }
}

/// Read access to a record's properties by key.
pub trait PropertySource: Send + Sync {
    /// Returns `None` when the record has no property with this key.
    fn property(&self, key: &str) -> Option<PropertyValue<'_>>;
}

/// A record type the mapper can insert and materialize.
pub trait Poco: PropertySource + Sized + Send + Sync + 'static {
    /// Rebuild a record from properties read back from a row. Properties
    /// whose columns were absent from the row are absent from the bag.
    fn from_properties(bag: PropertyBag) -> Result<Self>;
}

/// Properties of one record, keyed by property key, already converted back
/// from their column representation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropertyBag {
    values: HashMap<String, Value>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove a property and convert it. Absent and null both read as `None`.
    pub fn take<T: FromValue>(&mut self, key: &str) -> Result<Option<T>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => T::from_value(v)
                .map(Some)
                .map_err(|reason| MapperError::conversion(key, key, reason)),
        }
    }

    /// Remove a `list`/`set` property and convert each element.
    pub fn take_list<T: FromValue>(&mut self, key: &str) -> Result<Option<Vec<T>>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => list_from_value(v)
                .map(Some)
                .map_err(|reason| MapperError::conversion(key, key, reason)),
        }
    }

    /// Remove a `map` property and collect it into a `HashMap`.
    pub fn take_map<K, V>(&mut self, key: &str) -> Result<Option<HashMap<K, V>>>
    where
        K: FromValue + Eq + Hash,
        V: FromValue,
    {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => map_from_value(v)
                .map(|entries| Some(entries.into_iter().collect()))
                .map_err(|reason| MapperError::conversion(key, key, reason)),
        }
    }

    /// Remove a nested UDT property and rebuild it as `T`.
    pub fn take_record<T: Poco>(&mut self, key: &str) -> Result<Option<T>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Self::record_from(key, v).map(Some),
        }
    }

    /// Remove a list of nested UDT values and rebuild each as `T`.
    pub fn take_records<T: Poco>(&mut self, key: &str) -> Result<Option<Vec<T>>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::List(items)) => items
                .into_iter()
                .map(|item| Self::record_from(key, item))
                .collect::<Result<Vec<T>>>()
                .map(Some),
            Some(other) => Err(MapperError::conversion(
                key,
                key,
                format!("expected list, found {}", other.kind()),
            )),
        }
    }

    fn record_from<T: Poco>(key: &str, value: Value) -> Result<T> {
        match value {
            Value::Composite(fields) => T::from_properties(fields.into_iter().collect()),
            other => Err(MapperError::conversion(
                key,
                key,
                format!("expected udt, found {}", other.kind()),
            )),
        }
    }
}

impl FromIterator<(String, Value)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
