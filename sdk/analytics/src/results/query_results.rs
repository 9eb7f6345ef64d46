use crate::error::{Error, Result};
use crate::results::row::Row;
use bytes::Bytes;
use couchbase_analytics_core::analyticsx::query_result::RawMetadata;
use couchbase_analytics_core::analyticsx::response_json::ErrorCodeAndMessage;
use couchbase_analytics_core::helpers::durations::parse_golang_duration;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// Fully buffered rows plus metadata for one query.
#[derive(Debug)]
pub struct QueryResult {
    rows: Vec<Row>,
    metadata: QueryMetadata,
}

impl QueryResult {
    pub(crate) fn new(rows: Vec<Row>, metadata: QueryMetadata) -> Self {
        Self { rows, metadata }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }
}

/// Response fields other than the rows. Metrics and warnings are kept in
/// wire form and decoded on access.
#[derive(Debug, Clone)]
pub struct QueryMetadata {
    request_id: String,
    metrics: Option<Bytes>,
    warnings: Option<Bytes>,
}

impl QueryMetadata {
    pub(crate) fn from_raw(raw: RawMetadata) -> Self {
        Self {
            // unexpected, the executor rejects responses without one
            request_id: raw.request_id.unwrap_or_else(|| "?".to_string()),
            metrics: raw.metrics,
            warnings: raw.warnings,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn metrics(&self) -> Result<QueryMetrics> {
        match &self.metrics {
            Some(raw) => QueryMetrics::new(raw),
            None => QueryMetrics::new(b"{}"),
        }
    }

    /// Warnings reported alongside a successful response.
    pub fn warnings(&self) -> Vec<QueryWarning> {
        match &self.warnings {
            None => vec![],
            Some(raw) => ErrorCodeAndMessage::from_json(raw)
                .into_iter()
                .map(QueryWarning::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWarning {
    code: u32,
    message: String,
}

impl QueryWarning {
    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ErrorCodeAndMessage> for QueryWarning {
    fn from(record: ErrorCodeAndMessage) -> Self {
        Self {
            code: record.code,
            message: record.msg,
        }
    }
}

/// Lazily decoded view of the response's `metrics` field. Missing fields
/// read as zero; fields of the wrong shape are data conversion errors.
#[derive(Clone)]
pub struct QueryMetrics {
    root: Value,
}

impl QueryMetrics {
    fn new(raw: &[u8]) -> Result<Self> {
        let root = serde_json::from_slice(raw).map_err(|e| {
            Error::new_data_conversion_error(format!("could not parse analytics metrics: {e}"))
        })?;
        Ok(Self { root })
    }

    pub fn elapsed_time(&self) -> Result<Duration> {
        self.decode_duration("elapsedTime")
    }

    pub fn execution_time(&self) -> Result<Duration> {
        self.decode_duration("executionTime")
    }

    pub fn result_count(&self) -> Result<u64> {
        self.decode_u64("resultCount")
    }

    pub fn result_size(&self) -> Result<u64> {
        self.decode_u64("resultSize")
    }

    pub fn processed_objects(&self) -> Result<u64> {
        self.decode_u64("processedObjects")
    }

    fn decode_duration(&self, field: &str) -> Result<Duration> {
        match self.root.get(field) {
            None | Some(Value::Null) => Ok(Duration::ZERO),
            Some(Value::String(s)) => parse_golang_duration(s).map_err(|e| {
                Error::new_data_conversion_error(format!(
                    "could not decode {field} in analytics metrics: {e}"
                ))
            }),
            Some(other) => Err(Error::new_data_conversion_error(format!(
                "could not decode {field} in analytics metrics: expected a string, got {other}"
            ))),
        }
    }

    fn decode_u64(&self, field: &str) -> Result<u64> {
        match self.root.get(field) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value.as_u64().ok_or_else(|| {
                Error::new_data_conversion_error(format!(
                    "could not decode {field} in analytics metrics: expected an integer, got {value}"
                ))
            }),
        }
    }
}

impl Debug for QueryMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryMetrics")
            .field("raw", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn metadata(metrics: Option<&str>, warnings: Option<&str>) -> QueryMetadata {
        QueryMetadata::from_raw(RawMetadata {
            request_id: Some("r1".to_string()),
            metrics: metrics.map(|s| Bytes::copy_from_slice(s.as_bytes())),
            warnings: warnings.map(|s| Bytes::copy_from_slice(s.as_bytes())),
            ..Default::default()
        })
    }

    #[test]
    fn metrics_decode_lazily() {
        let meta = metadata(
            Some(
                r#"{"elapsedTime":"1.748019ms","executionTime":"110.826µs","resultCount":2,"resultSize":274,"processedObjects":7}"#,
            ),
            None,
        );
        let metrics = meta.metrics().unwrap();
        assert_eq!(metrics.elapsed_time().unwrap(), Duration::from_nanos(1_748_019));
        assert_eq!(metrics.execution_time().unwrap(), Duration::from_nanos(110_826));
        assert_eq!(metrics.result_count().unwrap(), 2);
        assert_eq!(metrics.result_size().unwrap(), 274);
        assert_eq!(metrics.processed_objects().unwrap(), 7);
    }

    #[test]
    fn missing_metrics_fields_default_to_zero() {
        let meta = metadata(None, None);
        let metrics = meta.metrics().unwrap();
        assert_eq!(metrics.elapsed_time().unwrap(), Duration::ZERO);
        assert_eq!(metrics.result_count().unwrap(), 0);
        assert_eq!(metrics.processed_objects().unwrap(), 0);
    }

    #[test]
    fn malformed_metrics_are_data_conversion_errors() {
        let meta = metadata(Some("not json"), None);
        assert!(matches!(
            meta.metrics().unwrap_err().kind(),
            ErrorKind::DataConversion { .. }
        ));

        let meta = metadata(Some(r#"{"resultCount":"two"}"#), None);
        let metrics = meta.metrics().unwrap();
        assert!(matches!(
            metrics.result_count().unwrap_err().kind(),
            ErrorKind::DataConversion { .. }
        ));
    }

    #[test]
    fn warnings_decode_from_wire_records() {
        let meta = metadata(
            None,
            Some(r#"[{"code":25000,"msg":"deprecated syntax"},{"code":1,"msg":"w2"}]"#),
        );
        let warnings = meta.warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].code(), 25000);
        assert_eq!(warnings[0].message(), "deprecated syntax");
    }

    #[test]
    fn absent_warnings_read_as_empty() {
        assert!(metadata(None, None).warnings().is_empty());
    }
}
