//! Property <-> column value conversion driven by a `MappingDefinition`.
//!
//! Writing lowers a `PropertyValue` to a `Value` of the column's type, running
//! the column converter on every scalar leaf first. Reading is the inverse:
//! leaves go back through the converter and UDT fields are re-keyed from
//! column names to property keys.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{MapperError, Result};
use crate::mapping::definition::{ColumnMapping, ColumnType, MappingDefinition, ValueConverter};
use crate::record::{PropertyBag, PropertySource, PropertyValue};
use crate::value::{Scalar, Value};

/// Read one mapped property off a record.
pub(crate) fn read_property<'a>(
    source: &'a dyn PropertySource,
    column: &ColumnMapping,
) -> Result<PropertyValue<'a>> {
    source.property(&column.property_key).ok_or_else(|| {
        MapperError::conversion(
            &column.property_key,
            &column.column_name,
            "record has no such property",
        )
    })
}

/// Convert a property value to its column representation.
pub(crate) fn to_column_value(
    value: PropertyValue<'_>,
    column: &ColumnMapping,
    owner: &MappingDefinition,
) -> Result<Value> {
    lower(value, &column.column_type, column.converter.as_deref(), owner).map_err(|reason| {
        MapperError::conversion(&column.property_key, &column.column_name, reason)
    })
}

/// Convert row columns back into record properties. Columns the definition
/// does not map are ignored; mapped columns missing from the row are left
/// out of the bag.
pub(crate) fn read_properties(
    fields: Vec<(String, Value)>,
    definition: &MappingDefinition,
) -> Result<PropertyBag> {
    lift_fields(fields, definition)
        .map(|props| props.into_iter().collect())
        .map_err(|(column, reason)| {
            MapperError::conversion(&column.property_key, &column.column_name, reason)
        })
}

fn same_column(definition: &MappingDefinition, mapped: &str, found: &str) -> bool {
    if definition.is_case_sensitive() {
        mapped == found
    } else {
        mapped.eq_ignore_ascii_case(found)
    }
}

fn lower(
    value: PropertyValue<'_>,
    ty: &ColumnType,
    converter: Option<&dyn ValueConverter>,
    owner: &MappingDefinition,
) -> std::result::Result<Value, String> {
    match (value, ty) {
        (PropertyValue::Null, _) => Ok(Value::Null),
        (PropertyValue::Scalar(s), ty) => {
            let s = match converter {
                Some(c) => c.to_column(s)?,
                None => s,
            };
            coerce(s, ty).map(Value::Scalar)
        }
        (PropertyValue::Record(source), ColumnType::Udt(key)) => {
            let nested = owner
                .nested(key)
                .ok_or_else(|| format!("user defined type {} is not resolved", key.name()))?;
            lower_fields(source, nested).map(Value::Composite)
        }
        (PropertyValue::List(items), ColumnType::List(inner) | ColumnType::Set(inner)) => items
            .into_iter()
            .map(|item| lower(item, inner, converter, owner))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        (PropertyValue::Map(entries), ColumnType::Map(k, v)) => entries
            .into_iter()
            .map(|(key, value)| {
                Ok((
                    lower(key, k, converter, owner)?,
                    lower(value, v, converter, owner)?,
                ))
            })
            .collect::<std::result::Result<Vec<_>, String>>()
            .map(Value::Map),
        (other, ty) => Err(format!("cannot store {} in a {ty} column", other.kind())),
    }
}

/// All fields of a nested record, nulls included, in declared order.
fn lower_fields(
    source: &dyn PropertySource,
    definition: &MappingDefinition,
) -> std::result::Result<Vec<(String, Value)>, String> {
    definition
        .columns()
        .iter()
        .map(|column| {
            let value = source
                .property(&column.property_key)
                .ok_or_else(|| format!("{}: record has no such property", column.property_key))?;
            let value = lower(value, &column.column_type, column.converter.as_deref(), definition)
                .map_err(|reason| format!("{}: {reason}", column.column_name))?;
            Ok((column.column_name.clone(), value))
        })
        .collect()
}

fn coerce(s: Scalar, ty: &ColumnType) -> std::result::Result<Scalar, String> {
    use ColumnType as T;

    Ok(match (s, ty) {
        (s @ Scalar::Boolean(_), T::Boolean) => s,
        (s @ Scalar::Int(_), T::Int) => s,
        (Scalar::BigInt(v), T::Int) => {
            Scalar::Int(i32::try_from(v).map_err(|_| format!("{v} is out of range for int"))?)
        }
        (s @ Scalar::BigInt(_), T::BigInt) => s,
        (Scalar::Int(v), T::BigInt) => Scalar::BigInt(i64::from(v)),
        (s @ Scalar::Float(_), T::Float) => s,
        (s @ Scalar::Double(_), T::Double) => s,
        (Scalar::Float(v), T::Double) => Scalar::Double(f64::from(v)),
        (Scalar::Int(v), T::Double) => Scalar::Double(f64::from(v)),
        (s @ Scalar::Decimal(_), T::Decimal) => s,
        (Scalar::Int(v), T::Decimal) => Scalar::Decimal(v.into()),
        (Scalar::BigInt(v), T::Decimal) => Scalar::Decimal(v.into()),
        (s @ Scalar::Text(_), T::Text) => s,
        (s @ Scalar::Uuid(_), T::Uuid) => s,
        (Scalar::Text(v), T::Uuid) => Scalar::Uuid(
            Uuid::parse_str(&v).map_err(|e| format!("'{v}' is not a valid uuid: {e}"))?,
        ),
        (s @ Scalar::Timestamp(_), T::Timestamp) => s,
        (Scalar::BigInt(ms), T::Timestamp) => Scalar::Timestamp(
            DateTime::<Utc>::from_timestamp_millis(ms)
                .ok_or_else(|| format!("{ms} ms is out of range for timestamp"))?,
        ),
        (s @ Scalar::Date(_), T::Date) => s,
        (Scalar::Timestamp(ts), T::Date) => Scalar::Date(ts.date_naive()),
        (s @ Scalar::Blob(_), T::Blob) => s,
        (s, ty) => return Err(format!("cannot convert {} to {ty}", s.type_name())),
    })
}

fn lift(
    value: Value,
    ty: &ColumnType,
    converter: Option<&dyn ValueConverter>,
    owner: &MappingDefinition,
) -> std::result::Result<Value, String> {
    match (value, ty) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Scalar(s), _) => match converter {
            Some(c) => c.from_column(s).map(Value::Scalar),
            None => Ok(Value::Scalar(s)),
        },
        (Value::Composite(fields), ColumnType::Udt(key)) => {
            let nested = owner
                .nested(key)
                .ok_or_else(|| format!("user defined type {} is not resolved", key.name()))?;
            lift_fields(fields, nested)
                .map(Value::Composite)
                .map_err(|(column, reason)| format!("{}: {reason}", column.column_name))
        }
        (Value::List(items), ColumnType::List(inner) | ColumnType::Set(inner)) => items
            .into_iter()
            .map(|item| lift(item, inner, converter, owner))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        (Value::Map(entries), ColumnType::Map(k, v)) => entries
            .into_iter()
            .map(|(key, value)| {
                Ok((
                    lift(key, k, converter, owner)?,
                    lift(value, v, converter, owner)?,
                ))
            })
            .collect::<std::result::Result<Vec<_>, String>>()
            .map(Value::Map),
        (other, ty) => Err(format!("cannot read {} from a {ty} column", other.kind())),
    }
}

/// Re-key fields from column names to property keys, in declared order.
fn lift_fields(
    mut fields: Vec<(String, Value)>,
    definition: &MappingDefinition,
) -> std::result::Result<Vec<(String, Value)>, (&ColumnMapping, String)> {
    let mut props = Vec::with_capacity(fields.len());
    for column in definition.columns() {
        let Some(pos) = fields
            .iter()
            .position(|(name, _)| same_column(definition, &column.column_name, name))
        else {
            continue;
        };
        let (_, value) = fields.swap_remove(pos);
        let value = lift(value, &column.column_type, column.converter.as_deref(), definition)
            .map_err(|reason| (column, reason))?;
        props.push((column.property_key.clone(), value));
    }
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::definition::{FnConverter, TypeKey};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Song {
        title: Option<String>,
        artist: Option<String>,
    }

    impl PropertySource for Song {
        fn property(&self, key: &str) -> Option<PropertyValue<'_>> {
            match key {
                "Title" => Some(PropertyValue::opt(self.title.clone())),
                "Artist" => Some(PropertyValue::opt(self.artist.clone())),
                _ => None,
            }
        }
    }

    struct Owner;

    fn song_def() -> Arc<MappingDefinition> {
        Arc::new(MappingDefinition::new::<Song>(
            "song",
            vec![
                ColumnMapping::new("Title", "title", ColumnType::Text),
                ColumnMapping::new("Artist", "artist", ColumnType::Text),
            ],
        ))
    }

    fn owner_def() -> MappingDefinition {
        let mut nested = HashMap::new();
        nested.insert(TypeKey::of::<Song>(), song_def());
        MappingDefinition::new::<Owner>(
            "owner",
            vec![
                ColumnMapping::new("Id", "id", ColumnType::Uuid).primary_key(),
                ColumnMapping::new("Songs", "songs", ColumnType::list(ColumnType::udt::<Song>())),
            ],
        )
        .with_nested(nested)
    }

    #[test]
    fn text_parses_into_uuid_column() {
        let id = Uuid::new_v4();
        let def = owner_def();
        let v = to_column_value(
            PropertyValue::scalar(id.to_string()),
            &def.columns()[0],
            &def,
        )
        .unwrap();
        assert_eq!(v, Value::from(id));
    }

    #[test]
    fn incompatible_scalar_fails_before_any_io() {
        let def = owner_def();
        let err =
            to_column_value(PropertyValue::scalar(true), &def.columns()[0], &def).unwrap_err();
        assert!(matches!(
            err,
            MapperError::MappingConversion { ref column, ref reason, .. }
                if column == "id" && reason == "cannot convert boolean to uuid"
        ));
    }

    #[test]
    fn nested_records_become_composites_in_declared_order() {
        let def = owner_def();
        let songs = [Song {
            title: Some("Pull me under".into()),
            artist: None,
        }];
        let v = to_column_value(
            PropertyValue::list(songs.iter().map(|s| PropertyValue::record(s))),
            &def.columns()[1],
            &def,
        )
        .unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::Composite(vec![
                ("title".into(), Value::from("Pull me under")),
                ("artist".into(), Value::Null),
            ])])
        );
    }

    #[test]
    fn converter_runs_on_each_leaf_both_ways() {
        let upper = Arc::new(FnConverter::new(
            |s| match s {
                Scalar::Text(t) => Ok(Scalar::Text(t.to_uppercase())),
                other => Ok(other),
            },
            |s| match s {
                Scalar::Text(t) => Ok(Scalar::Text(t.to_lowercase())),
                other => Ok(other),
            },
        ));
        struct Tagged;
        let def = MappingDefinition::new::<Tagged>(
            "tagged",
            vec![
                ColumnMapping::new("Tags", "tags", ColumnType::set(ColumnType::Text))
                    .with_converter(upper),
            ],
        );
        let written = to_column_value(
            PropertyValue::list([PropertyValue::scalar("a"), PropertyValue::scalar("b")]),
            &def.columns()[0],
            &def,
        )
        .unwrap();
        assert_eq!(written, Value::List(vec![Value::from("A"), Value::from("B")]));

        let mut bag = read_properties(vec![("tags".into(), written)], &def).unwrap();
        assert_eq!(
            bag.take_list::<String>("Tags").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn read_properties_matches_columns_case_insensitively() {
        let def = owner_def();
        let id = Uuid::new_v4();
        let mut bag = read_properties(
            vec![
                ("ID".into(), Value::from(id)),
                ("unmapped".into(), Value::from(1)),
                (
                    "songs".into(),
                    Value::List(vec![Value::Composite(vec![(
                        "TITLE".into(),
                        Value::from("Under a glass moon"),
                    )])]),
                ),
            ],
            &def,
        )
        .unwrap();
        assert_eq!(bag.take::<Uuid>("Id").unwrap(), Some(id));
        let songs = bag.take::<Value>("Songs").unwrap().unwrap();
        assert_eq!(
            songs,
            Value::List(vec![Value::Composite(vec![(
                "Title".into(),
                Value::from("Under a glass moon")
            )])])
        );
        assert!(bag.is_empty());
    }

    #[test]
    fn case_sensitive_definition_requires_exact_names() {
        let def = owner_def().case_sensitive();
        let bag = read_properties(vec![("ID".into(), Value::from(Uuid::nil()))], &def).unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn integers_widen_into_larger_columns() {
        assert_eq!(coerce(Scalar::Int(7), &ColumnType::BigInt), Ok(Scalar::BigInt(7)));
        assert_eq!(coerce(Scalar::Int(7), &ColumnType::Double), Ok(Scalar::Double(7.0)));
        assert_eq!(
            coerce(Scalar::Int(7), &ColumnType::Decimal),
            Ok(Scalar::Decimal(Decimal::from(7)))
        );
        assert_eq!(
            coerce(Scalar::BigInt(-3), &ColumnType::Decimal),
            Ok(Scalar::Decimal(Decimal::from(-3)))
        );
        assert_eq!(coerce(Scalar::Float(0.5), &ColumnType::Double), Ok(Scalar::Double(0.5)));
    }

    #[test]
    fn bigint_narrows_into_int_only_when_it_fits() {
        assert_eq!(coerce(Scalar::BigInt(42), &ColumnType::Int), Ok(Scalar::Int(42)));
        assert_eq!(
            coerce(Scalar::BigInt(i64::MAX), &ColumnType::Int),
            Err("9223372036854775807 is out of range for int".to_string())
        );
        assert_eq!(
            coerce(Scalar::BigInt(i64::from(i32::MIN) - 1), &ColumnType::Int),
            Err("-2147483649 is out of range for int".to_string())
        );
    }

    #[test]
    fn epoch_millis_and_timestamps_convert_to_time_columns() {
        let at = DateTime::<Utc>::from_timestamp_millis(1_400_000_000_000).unwrap();
        assert_eq!(
            coerce(Scalar::BigInt(1_400_000_000_000), &ColumnType::Timestamp),
            Ok(Scalar::Timestamp(at))
        );
        assert_eq!(
            coerce(Scalar::Timestamp(at), &ColumnType::Date),
            Ok(Scalar::Date(NaiveDate::from_ymd_opt(2014, 5, 13).unwrap()))
        );
        assert_eq!(
            coerce(Scalar::BigInt(i64::MAX), &ColumnType::Timestamp),
            Err(format!("{} ms is out of range for timestamp", i64::MAX))
        );
    }

    #[test]
    fn map_column_converts_both_ways() {
        struct Family;
        let def = MappingDefinition::new::<Family>(
            "family",
            vec![ColumnMapping::new(
                "Ages",
                "ages",
                ColumnType::map(ColumnType::Text, ColumnType::BigInt),
            )],
        );
        let written = to_column_value(
            PropertyValue::map([
                (PropertyValue::scalar("a"), PropertyValue::scalar(3i32)),
                (PropertyValue::scalar("b"), PropertyValue::Null),
            ]),
            &def.columns()[0],
            &def,
        )
        .unwrap();
        assert_eq!(
            written,
            Value::Map(vec![
                (Value::from("a"), Value::from(3i64)),
                (Value::from("b"), Value::Null),
            ])
        );

        let mut bag = read_properties(vec![("AGES".into(), written)], &def).unwrap();
        assert_eq!(
            bag.take::<Value>("Ages").unwrap(),
            Some(Value::Map(vec![
                (Value::from("a"), Value::from(3i64)),
                (Value::from("b"), Value::Null),
            ]))
        );
    }

    #[test]
    fn map_entry_of_wrong_type_names_the_column() {
        struct Family;
        let def = MappingDefinition::new::<Family>(
            "family",
            vec![ColumnMapping::new(
                "Ages",
                "ages",
                ColumnType::map(ColumnType::Text, ColumnType::Int),
            )],
        );
        let err = to_column_value(
            PropertyValue::map([(PropertyValue::scalar("a"), PropertyValue::scalar(i64::MAX))]),
            &def.columns()[0],
            &def,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MapperError::MappingConversion { ref column, ref reason, .. }
                if column == "ages" && reason == "9223372036854775807 is out of range for int"
        ));
    }

    #[test]
    fn list_in_a_map_column_is_rejected() {
        struct Family;
        let def = MappingDefinition::new::<Family>(
            "family",
            vec![ColumnMapping::new(
                "Ages",
                "ages",
                ColumnType::map(ColumnType::Text, ColumnType::Int),
            )],
        );
        let err = to_column_value(
            PropertyValue::list([PropertyValue::scalar(1)]),
            &def.columns()[0],
            &def,
        )
        .unwrap_err();
        assert!(err.to_string().ends_with("cannot store list in a map<text, int> column"));
    }
}
