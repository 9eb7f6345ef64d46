use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt::Debug;

/// Converts raw row bytes into a JSON value; [`crate::Row::content_as`]
/// finishes the conversion into the caller's type. Implementations may
/// reshape the value on the way through.
pub trait Deserializer: Send + Sync + Debug {
    fn deserialize(&self, bytes: &[u8]) -> Result<Value>;
}

/// The default deserializer, backed by serde_json.
#[derive(Debug, Clone, Default)]
pub struct JsonDeserializer {}

impl JsonDeserializer {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Deserializer for JsonDeserializer {
    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::new_data_conversion_error(format!("failed to decode row: {e}")))
    }
}
