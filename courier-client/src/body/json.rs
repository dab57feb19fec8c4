//! JSON bodies.

use courier_core::{BodyError, RequestBody};
use serde::Serialize;
use serde_json::Value;

/// Content type sent with JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A body serialized as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody {
    value: Value,
}

impl JsonBody {
    /// Wraps an already-built JSON value.
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Serializes any value into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::Json`] if the value cannot be represented as JSON.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, BodyError> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Returns the wrapped value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl From<Value> for JsonBody {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl RequestBody for JsonBody {
    fn content_type(&self) -> Option<String> {
        Some(JSON_CONTENT_TYPE.to_string())
    }

    fn payload(&self) -> Result<Vec<u8>, BodyError> {
        Ok(serde_json::to_vec(&self.value)?)
    }
}
