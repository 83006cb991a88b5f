//! Value types for Ironbox objects
//!
//! This module defines:
//! - [`Value`]: the runtime value of one property
//! - [`FlexValue`]: the dynamically typed value stored in `Flex` properties
//! - [`Object`]: a decoded (or to-be-encoded) object, property name -> value
//!
//! ## Type Rules
//!
//! - No implicit coercions between unrelated types: `Int(1) != Float(1.0)`
//! - Integer kinds of every width share `Int(i64)`; the codec range-checks
//! - Float equality follows IEEE-754: `NaN != NaN`, `-0.0 == 0.0`
//! - Dates may be given as `Timestamp`, `LocalTimestamp`, `Float` seconds or
//!   `Int` in the property's native unit

use crate::kind::{DateRepr, ValueKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Dynamically typed value of a `Flex` property
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlexValue {
    /// Null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Nested list
    List(Vec<FlexValue>),
    /// Nested map with string keys
    Map(BTreeMap<String, FlexValue>),
}

impl FlexValue {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            FlexValue::Null => "Null",
            FlexValue::Bool(_) => "Bool",
            FlexValue::Int(_) => "Int",
            FlexValue::Float(_) => "Float",
            FlexValue::String(_) => "String",
            FlexValue::List(_) => "List",
            FlexValue::Map(_) => "Map",
        }
    }

    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, FlexValue::Null)
    }
}

// Serialized through the data model's native types so that self-describing
// formats (MessagePack) store a plain nil/bool/int/float/str/array/map tree.
impl Serialize for FlexValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlexValue::Null => serializer.serialize_unit(),
            FlexValue::Bool(b) => serializer.serialize_bool(*b),
            FlexValue::Int(i) => serializer.serialize_i64(*i),
            FlexValue::Float(f) => serializer.serialize_f64(*f),
            FlexValue::String(s) => serializer.serialize_str(s),
            FlexValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FlexValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

struct FlexVisitor;

impl<'de> Visitor<'de> for FlexVisitor {
    type Value = FlexValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a null, bool, number, string, list or string-keyed map")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<FlexValue, E> {
        Ok(FlexValue::Null)
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<FlexValue, E> {
        Ok(FlexValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<FlexValue, D::Error> {
        FlexValue::deserialize(deserializer)
    }

    fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<FlexValue, E> {
        Ok(FlexValue::Bool(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<FlexValue, E> {
        Ok(FlexValue::Int(v))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<FlexValue, E> {
        i64::try_from(v)
            .map(FlexValue::Int)
            .map_err(|_| E::custom(format!("integer {} exceeds the int64 range", v)))
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<FlexValue, E> {
        Ok(FlexValue::Float(v))
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<FlexValue, E> {
        Ok(FlexValue::String(v.to_string()))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<FlexValue, E> {
        Ok(FlexValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FlexValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(FlexValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FlexValue, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((k, v)) = map.next_entry::<String, FlexValue>()? {
            entries.insert(k, v);
        }
        Ok(FlexValue::Map(entries))
    }
}

impl<'de> Deserialize<'de> for FlexValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexVisitor)
    }
}

/// Runtime value of one property
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null (encoded as the kind's default)
    Null,
    /// Boolean
    Bool(bool),
    /// Integer of any width, also integer epoch for dates
    Int(i64),
    /// Float of any width, also float seconds for dates
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Timezone-aware timestamp
    Timestamp(DateTime<Utc>),
    /// Timezone-naive timestamp, interpreted in the local zone
    LocalTimestamp(NaiveDateTime),
    /// Dynamically typed value
    Flex(FlexValue),
    /// Vector of booleans
    BoolVector(Vec<bool>),
    /// Vector of integers (any width; dates in native unit)
    IntVector(Vec<i64>),
    /// Vector of 32-bit floats
    FloatVector(Vec<f32>),
    /// Vector of 64-bit floats
    DoubleVector(Vec<f64>),
    /// Vector of strings
    StringVector(Vec<String>),
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Timestamp(_) => "Timestamp",
            Value::LocalTimestamp(_) => "LocalTimestamp",
            Value::Flex(_) => "Flex",
            Value::BoolVector(_) => "BoolVector",
            Value::IntVector(_) => "IntVector",
            Value::FloatVector(_) => "FloatVector",
            Value::DoubleVector(_) => "DoubleVector",
            Value::StringVector(_) => "StringVector",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Default value a property of `kind` decodes to when its slot is absent
    pub fn default_for(kind: ValueKind, date_repr: DateRepr) -> Value {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Byte
            | ValueKind::Short
            | ValueKind::Char
            | ValueKind::Int
            | ValueKind::Long => Value::Int(0),
            ValueKind::Float | ValueKind::Double => Value::Float(0.0),
            ValueKind::String => Value::String(String::new()),
            ValueKind::Date | ValueKind::DateNano => match date_repr {
                DateRepr::Int => Value::Int(0),
                DateRepr::Float => Value::Float(0.0),
                DateRepr::Timestamp => Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH),
            },
            ValueKind::Flex => Value::Flex(FlexValue::Null),
            ValueKind::BoolVector => Value::BoolVector(Vec::new()),
            ValueKind::ByteVector => Value::Bytes(Vec::new()),
            ValueKind::ShortVector
            | ValueKind::CharVector
            | ValueKind::IntVector
            | ValueKind::LongVector
            | ValueKind::DateVector
            | ValueKind::DateNanoVector => Value::IntVector(Vec::new()),
            ValueKind::FloatVector => Value::FloatVector(Vec::new()),
            ValueKind::DoubleVector => Value::DoubleVector(Vec::new()),
            ValueKind::StringVector => Value::StringVector(Vec::new()),
        }
    }

    /// View this value as a flex value, if it has a flex equivalent
    pub fn to_flex(&self) -> Option<FlexValue> {
        match self {
            Value::Null => Some(FlexValue::Null),
            Value::Bool(b) => Some(FlexValue::Bool(*b)),
            Value::Int(i) => Some(FlexValue::Int(*i)),
            Value::Float(f) => Some(FlexValue::Float(*f)),
            Value::String(s) => Some(FlexValue::String(s.clone())),
            Value::Flex(f) => Some(f.clone()),
            Value::StringVector(items) => Some(FlexValue::List(
                items.iter().cloned().map(FlexValue::String).collect(),
            )),
            _ => None,
        }
    }
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = Value;

                fn try_from(v: Value) -> Result<Self, Value> {
                    match v {
                        Value::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    bool => Bool,
    i64 => Int,
    f64 => Float,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
    NaiveDateTime => LocalTimestamp,
    FlexValue => Flex,
    Vec<bool> => BoolVector,
    Vec<i64> => IntVector,
    Vec<f32> => FloatVector,
    Vec<f64> => DoubleVector,
    Vec<String> => StringVector,
}

macro_rules! narrow_int_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Int(i64::from(v))
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = Value;

                fn try_from(v: Value) -> Result<Self, Value> {
                    match v {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| Value::Int(i)),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

narrow_int_conversions!(i8, i16, u16, i32, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i64)
    }
}

impl TryFrom<Value> for u64 {
    type Error = Value;

    fn try_from(v: Value) -> Result<Self, Value> {
        match v {
            Value::Int(i) if i >= 0 => Ok(i as u64),
            other => Err(other),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl TryFrom<Value> for f32 {
    type Error = Value;

    fn try_from(v: Value) -> Result<Self, Value> {
        match v {
            Value::Float(f) => Ok(f as f32),
            other => Err(other),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntVector(v.into_iter().map(i64::from).collect())
    }
}

/// A decoded or to-be-encoded object: property name -> value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Object {
    values: BTreeMap<String, Value>,
}

impl Object {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a property value, returning the previous one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Remove and return a property value
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Remove a property value and convert it to `T`
    ///
    /// # Errors
    ///
    /// Returns `ValueMismatch` if the value is missing or of another type.
    pub fn take_as<T: TryFrom<Value, Error = Value>>(&mut self, name: &str) -> crate::Result<T> {
        let value = self.values.remove(name).unwrap_or(Value::Null);
        T::try_from(value).map_err(|v| crate::Error::ValueMismatch {
            property: name.to_string(),
            expected: std::any::type_name::<T>().to_string(),
            found: v.type_name(),
        })
    }

    /// True if the property is present
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of property values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no property values are present
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (name, value) in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_different_types_not_equal() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Bytes(b"a".to_vec()), Value::String("a".to_string()));
    }

    #[test]
    fn test_narrow_conversions_range_checked() {
        assert_eq!(i8::try_from(Value::Int(127)), Ok(127));
        assert!(i8::try_from(Value::Int(128)).is_err());
        assert!(u16::try_from(Value::Int(-1)).is_err());
        assert_eq!(Value::from(7u16), Value::Int(7));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            Value::default_for(ValueKind::String, DateRepr::Int),
            Value::String(String::new())
        );
        assert_eq!(
            Value::default_for(ValueKind::Flex, DateRepr::Int),
            Value::Flex(FlexValue::Null)
        );
        assert_eq!(
            Value::default_for(ValueKind::Date, DateRepr::Float),
            Value::Float(0.0)
        );
        assert_eq!(
            Value::default_for(ValueKind::ByteVector, DateRepr::Int),
            Value::Bytes(Vec::new())
        );
    }

    #[test]
    fn test_object_take_as() {
        let mut obj = Object::new().with("name", "foo").with("count", 3i64);
        assert_eq!(obj.len(), 2);
        let name: String = obj.take_as("name").unwrap();
        assert_eq!(name, "foo");
        let err = obj.take_as::<String>("count").unwrap_err();
        assert!(matches!(err, crate::Error::ValueMismatch { found: "Int", .. }));
        assert!(obj.is_empty());
    }

    #[test]
    fn test_flex_json_shape() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), FlexValue::Int(1));
        map.insert(
            "b".to_string(),
            FlexValue::List(vec![FlexValue::Null, FlexValue::Bool(true)]),
        );
        let flex = FlexValue::Map(map);
        let json = serde_json::to_string(&flex).unwrap();
        assert_eq!(json, r#"{"a":1,"b":[null,true]}"#);
        let back: FlexValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, flex);
    }
}
