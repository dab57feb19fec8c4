//! Property-list bodies.

use courier_core::{BodyError, RequestBody};
use plist::Value;
use serde::Serialize;

/// Content type sent with property-list bodies, whatever their encoding.
pub const PLIST_CONTENT_TYPE: &str = "text/x-xml-plist";

/// How a property list is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlistFormat {
    /// XML plist.
    #[default]
    Xml,
    /// Binary plist (`bplist00`).
    Binary,
}

/// A body serialized as a property list.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyListBody {
    value: Value,
    format: PlistFormat,
}

impl PropertyListBody {
    /// Wraps a property-list value, encoded as XML.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            format: PlistFormat::default(),
        }
    }

    /// Serializes any value into a property-list body.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::InvalidForContentType`] if the value has no
    /// property-list representation.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, BodyError> {
        plist::to_value(value).map(Self::new).map_err(encoding_error)
    }

    /// Sets the encoding.
    #[must_use]
    pub fn format(mut self, format: PlistFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the wrapped value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

fn encoding_error(e: plist::Error) -> BodyError {
    BodyError::InvalidForContentType {
        content_type: PLIST_CONTENT_TYPE.to_string(),
        reason: e.to_string(),
    }
}

impl RequestBody for PropertyListBody {
    fn content_type(&self) -> Option<String> {
        Some(PLIST_CONTENT_TYPE.to_string())
    }

    fn payload(&self) -> Result<Vec<u8>, BodyError> {
        let mut bytes = Vec::new();
        match self.format {
            PlistFormat::Xml => self.value.to_writer_xml(&mut bytes),
            PlistFormat::Binary => self.value.to_writer_binary(&mut bytes),
        }
        .map_err(encoding_error)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Dictionary;

    fn settings() -> Value {
        let mut dict = Dictionary::new();
        dict.insert("name".to_string(), Value::from("courier"));
        dict.insert("retries".to_string(), Value::from(3_i64));
        dict.insert("enabled".to_string(), Value::Boolean(true));
        Value::Dictionary(dict)
    }

    #[test]
    fn test_xml_is_the_default() {
        let body = PropertyListBody::new(settings());
        assert_eq!(body.content_type().as_deref(), Some("text/x-xml-plist"));

        let payload = body.payload().unwrap();
        let text = String::from_utf8(payload.clone()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<key>name</key>"));
        assert!(text.contains("<string>courier</string>"));

        let decoded: Value = plist::from_bytes(&payload).unwrap();
        assert_eq!(decoded, settings());
    }

    #[test]
    fn test_binary_format() {
        let body = PropertyListBody::new(settings()).format(PlistFormat::Binary);
        assert_eq!(body.content_type().as_deref(), Some("text/x-xml-plist"));

        let payload = body.payload().unwrap();
        assert!(payload.starts_with(b"bplist00"));
        let decoded: Value = plist::from_bytes(&payload).unwrap();
        assert_eq!(decoded, settings());
    }

    #[test]
    fn test_from_serialize_struct() {
        #[derive(Serialize)]
        struct Device<'a> {
            model: &'a str,
            build: u32,
        }

        let body = PropertyListBody::from_serialize(&Device { model: "kiosk", build: 42 }).unwrap();
        let dict = body.value().as_dictionary().unwrap();
        assert_eq!(dict.get("model").and_then(Value::as_string), Some("kiosk"));
        assert_eq!(dict.get("build").and_then(Value::as_unsigned_integer), Some(42));
    }
}
