use crate::deserializer::Deserializer;
use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// One element of the query result, as opaque JSON bytes plus the
/// deserializer chosen for the request.
#[derive(Clone)]
pub struct Row {
    bytes: Bytes,
    deserializer: Arc<dyn Deserializer>,
}

impl Row {
    pub(crate) fn new(bytes: Bytes, deserializer: Arc<dyn Deserializer>) -> Self {
        Self {
            bytes,
            deserializer,
        }
    }

    /// The raw JSON of this row. Not copied defensively.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decodes the row into `T` via the request's deserializer. A row whose
    /// value is JSON `null` decodes into `Option<T>` as `None`; decoding it
    /// into a non-optional type is a data conversion error.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.deserializer.deserialize(&self.bytes)?;
        serde_json::from_value(value).map_err(|e| {
            Error::new_data_conversion_error(format!("failed to convert row to target type: {e}"))
        })
    }
}

impl Debug for Row {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("bytes", &String::from_utf8_lossy(&self.bytes))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserializer::JsonDeserializer;
    use crate::error::ErrorKind;
    use serde_json::{json, Value};

    fn row(raw: &str) -> Row {
        Row::new(
            Bytes::copy_from_slice(raw.as_bytes()),
            Arc::new(JsonDeserializer::new()),
        )
    }

    #[test]
    fn decodes_into_caller_types() {
        assert_eq!(row("42").content_as::<i64>().unwrap(), 42);
        assert_eq!(
            row(r#"{"greeting":"hello world"}"#)
                .content_as::<Value>()
                .unwrap(),
            json!({"greeting": "hello world"})
        );
    }

    #[test]
    fn null_row_requires_an_optional_target() {
        let null_row = row("null");

        let err = null_row.content_as::<String>().expect_err("null into String");
        assert!(matches!(err.kind(), ErrorKind::DataConversion { .. }));

        assert_eq!(null_row.content_as::<Option<String>>().unwrap(), None);
    }

    #[test]
    fn malformed_row_is_a_data_conversion_error() {
        let err = row("{oops").content_as::<Value>().expect_err("bad JSON");
        assert!(matches!(err.kind(), ErrorKind::DataConversion { .. }));
    }
}
