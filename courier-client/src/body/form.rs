//! URL-encoded form bodies.

use courier_core::{BodyError, RequestBody};
use url::form_urlencoded;

/// A body encoded as `application/x-www-form-urlencoded`.
///
/// Pairs are written in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Returns the fields.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormBody {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl RequestBody for FormBody {
    fn content_type(&self) -> Option<String> {
        Some("application/x-www-form-urlencoded".to_string())
    }

    fn payload(&self) -> Result<Vec<u8>, BodyError> {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.pairs)
            .finish();
        Ok(encoded.into_bytes())
    }
}
