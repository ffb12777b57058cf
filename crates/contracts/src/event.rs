//! Event - immutable record routed by signal
//!
//! Scalar members never change after construction. The field list is owned
//! by each copy: `clone()` gives a structurally independent event so sinks
//! running concurrently never observe each other's edits.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

use crate::{Field, Signal};

/// Call-site metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub file: String,
    pub line: u32,
    /// Enclosing function or module path, when known
    pub function: Option<String>,
}

impl Caller {
    /// Capture from a `#[track_caller]` location
    pub fn from_location(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            function: None,
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Routed event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    time: DateTime<Utc>,
    caller: Option<Caller>,
    signal: Signal,
    message: String,
    fields: Vec<Field>,
}

impl Event {
    /// Create an event stamped with the current time.
    ///
    /// Caller info is left empty; the emit call site fills it in.
    pub fn new(
        signal: impl Into<Signal>,
        message: impl Into<String>,
        fields: impl IntoIterator<Item = Field>,
    ) -> Self {
        Self {
            time: Utc::now(),
            caller: None,
            signal: signal.into(),
            message: message.into(),
            fields: fields.into_iter().collect(),
        }
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Override the timestamp (replay, tests)
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    #[inline]
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    #[inline]
    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    #[inline]
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Mutable access to this copy's field list.
    ///
    /// Sinks may enrich or redact their own copy; other copies are unaffected.
    #[inline]
    pub fn fields_mut(&mut self) -> &mut Vec<Field> {
        &mut self.fields
    }

    /// Last field with the given key
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().rev().find(|f| f.key() == key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key() == key)
    }

    /// One field per key: the last value for the key, at the position of its
    /// first occurrence
    pub fn distinct_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        let mut last_index: HashMap<&str, usize> = HashMap::with_capacity(self.fields.len());
        for (idx, field) in self.fields.iter().enumerate() {
            last_index.insert(field.key(), idx);
        }
        self.fields
            .iter()
            .filter_map(move |field| last_index.remove(field.key()).map(|idx| &self.fields[idx]))
    }
}

const RESERVED_KEYS: [&str; 4] = ["time", "signal", "message", "caller"];

/// Flat JSON object: `time`, `signal`, `message`, optional `caller`, then
/// every field hoisted to the top level.
///
/// A field whose key collides with a reserved key is written as
/// `fields.<key>`. When several fields share a key, the last one wins and
/// keeps the position of the first.
impl Serialize for Event {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(
            "time",
            &self.time.to_rfc3339_opts(SecondsFormat::Nanos, true),
        )?;
        map.serialize_entry("signal", self.signal.as_str())?;
        map.serialize_entry("message", &self.message)?;
        if let Some(caller) = &self.caller {
            map.serialize_entry("caller", &caller.to_string())?;
        }

        for field in self.distinct_fields() {
            let value = field.value().to_json();
            if RESERVED_KEYS.contains(&field.key()) {
                map.serialize_entry(&format!("fields.{}", field.key()), &value)?;
            } else {
                map.serialize_entry(field.key(), &value)?;
            }
        }

        map.end()
    }
}
