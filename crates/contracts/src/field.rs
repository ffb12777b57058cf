//! Field - typed key/value pair attached to an event
//!
//! Fields are immutable once built. Constructors are pure: they touch no
//! global state and allocate nothing beyond the field itself.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a field's value should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Int64,
    Float64,
    Bool,
    /// Error rendered to its display string
    Error,
    Duration,
    Time,
    Bytes,
    Strings,
    /// Opaque structured data
    Data,
}

/// Field payload
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Time(DateTime<Utc>),
    Bytes(Bytes),
    Strings(Vec<String>),
    Data(serde_json::Value),
}

impl FieldValue {
    /// Render as the JSON value written to structured outputs.
    ///
    /// Durations become integer nanoseconds, timestamps RFC3339 with
    /// nanoseconds, byte strings lossy UTF-8. Non-finite floats have no JSON
    /// number form and are written as strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            Self::Bool(b) => Value::Bool(*b),
            Self::Duration(d) => Value::from(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            Self::Time(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Self::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            Self::Strings(list) => Value::from(list.clone()),
            Self::Data(v) => v.clone(),
        }
    }
}

/// Conversion used by [`Field::new`] to infer the field type from a Rust value.
pub trait IntoFieldValue {
    /// Field type recorded for values of this Rust type
    const TYPE: FieldType;

    fn into_field_value(self) -> FieldValue;
}

macro_rules! impl_int_field {
    ($kind:ident => $($ty:ty),+) => {
        $(
            impl IntoFieldValue for $ty {
                const TYPE: FieldType = FieldType::$kind;

                #[inline]
                fn into_field_value(self) -> FieldValue {
                    FieldValue::Int(i64::from(self))
                }
            }
        )+
    };
}

impl_int_field!(Int => i8, i16, i32);
impl_int_field!(Int64 => i64, u8, u16, u32);

impl IntoFieldValue for isize {
    const TYPE: FieldType = FieldType::Int;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }
}

impl IntoFieldValue for u64 {
    const TYPE: FieldType = FieldType::Int64;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }
}

impl IntoFieldValue for usize {
    const TYPE: FieldType = FieldType::Int64;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }
}

impl IntoFieldValue for f64 {
    const TYPE: FieldType = FieldType::Float64;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Float(self)
    }
}

impl IntoFieldValue for f32 {
    const TYPE: FieldType = FieldType::Float64;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Float(f64::from(self))
    }
}

impl IntoFieldValue for bool {
    const TYPE: FieldType = FieldType::Bool;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Bool(self)
    }
}

impl IntoFieldValue for String {
    const TYPE: FieldType = FieldType::String;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Str(self)
    }
}

impl IntoFieldValue for &str {
    const TYPE: FieldType = FieldType::String;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Str(self.to_string())
    }
}

impl IntoFieldValue for &String {
    const TYPE: FieldType = FieldType::String;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Str(self.clone())
    }
}

impl IntoFieldValue for Duration {
    const TYPE: FieldType = FieldType::Duration;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Duration(self)
    }
}

impl IntoFieldValue for DateTime<Utc> {
    const TYPE: FieldType = FieldType::Time;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Time(self)
    }
}

impl IntoFieldValue for Bytes {
    const TYPE: FieldType = FieldType::Bytes;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Bytes(self)
    }
}

impl IntoFieldValue for Vec<u8> {
    const TYPE: FieldType = FieldType::Bytes;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Bytes(Bytes::from(self))
    }
}

impl IntoFieldValue for Vec<String> {
    const TYPE: FieldType = FieldType::Strings;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Strings(self)
    }
}

impl IntoFieldValue for Vec<&str> {
    const TYPE: FieldType = FieldType::Strings;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Strings(self.into_iter().map(str::to_string).collect())
    }
}

impl IntoFieldValue for serde_json::Value {
    const TYPE: FieldType = FieldType::Data;

    fn into_field_value(self) -> FieldValue {
        FieldValue::Data(self)
    }
}

/// Typed key/value pair
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    key: String,
    kind: FieldType,
    value: FieldValue,
}

impl Field {
    /// Build a field, inferring its type from the value.
    ///
    /// # Examples
    /// ```
    /// use contracts::{Field, FieldType};
    ///
    /// let amount = Field::new("amount", 99.99);
    /// assert_eq!(amount.field_type(), FieldType::Float64);
    /// assert_eq!(amount.as_f64(), Some(99.99));
    /// ```
    pub fn new<V: IntoFieldValue>(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            kind: V::TYPE,
            value: value.into_field_value(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::typed(key, FieldType::String, FieldValue::Str(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i32) -> Self {
        Self::new(key, value)
    }

    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, value)
    }

    pub fn float64(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, value)
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, value)
    }

    /// Error captured as its display string
    pub fn error(key: impl Into<String>, err: &dyn std::error::Error) -> Self {
        Self::typed(key, FieldType::Error, FieldValue::Str(err.to_string()))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, value)
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(key, value)
    }

    pub fn bytes(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self::typed(key, FieldType::Bytes, FieldValue::Bytes(value.into()))
    }

    pub fn strings<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        Self::typed(key, FieldType::Strings, FieldValue::Strings(values))
    }

    /// Opaque structured data
    pub fn data(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(key, value)
    }

    fn typed(key: impl Into<String>, kind: FieldType, value: FieldValue) -> Self {
        Self {
            key: key.into(),
            kind,
            value,
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.kind
    }

    #[inline]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// String content of `String` and `Error` fields
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            FieldValue::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            FieldValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            FieldValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self.value {
            FieldValue::Duration(d) => Some(d),
            _ => None,
        }
    }
}

/// Build a `Vec<Field>` with inferred types.
///
/// ```
/// use contracts::{fields, FieldType};
///
/// let fields = fields!["amount" => 99.99, "user" => "u1", "retries" => 3];
/// assert_eq!(fields.len(), 3);
/// assert_eq!(fields[2].field_type(), FieldType::Int);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        ::std::vec::Vec::<$crate::Field>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Field::new($key, $value)),+]
    };
}
