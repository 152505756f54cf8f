//! JSON Streams
//!
//! Parsing and serialization as stream combinators. A value that fails to
//! parse or serialize aborts the pass with [`Error::Json`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;
use crate::reactive::EventStream;

impl EventStream<String> {
    /// Parse every event as JSON into `T`.
    pub fn json_parse<T: DeserializeOwned + 'static>(&self) -> EventStream<T> {
        self.try_map_e(|text| serde_json::from_str::<T>(text))
    }
}

impl<T: Serialize + 'static> EventStream<T> {
    /// Serialize every event to a JSON string.
    pub fn json_stringify(&self) -> EventStream<String> {
        self.try_map_e(|value| serde_json::to_string(value))
    }
}

impl EventStream<Value> {
    /// The `field` member of every event. Events that are not objects abort
    /// the pass; a missing field yields `Value::Null`.
    pub fn index(&self, field: impl Into<String>) -> EventStream<Value> {
        let field = field.into();
        self.try_map_e(move |value| match value {
            Value::Object(map) => Ok(map.get(&field).cloned().unwrap_or(Value::Null)),
            other => Err(Error::UnexpectedValue(format!(
                "expected an object to index with {field:?}, got {other}"
            ))),
        })
    }
}
