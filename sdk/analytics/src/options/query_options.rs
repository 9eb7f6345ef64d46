use crate::deserializer::Deserializer;
use couchbase_analytics_core::analyticsx;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanConsistency {
    NotBounded,
    RequestPlus,
}

impl From<ScanConsistency> for analyticsx::query_options::ScanConsistency {
    fn from(sc: ScanConsistency) -> Self {
        match sc {
            ScanConsistency::NotBounded => analyticsx::query_options::ScanConsistency::NotBounded,
            ScanConsistency::RequestPlus => analyticsx::query_options::ScanConsistency::RequestPlus,
        }
    }
}

/// Optional parameters for [`crate::Cluster::execute_query`] and
/// [`crate::Cluster::execute_streaming_query`]. The struct is consumed by
/// the call, which freezes it for the lifetime of the request.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct QueryOptions {
    pub(crate) timeout: Option<Duration>,
    pub(crate) client_context_id: Option<String>,
    pub(crate) read_only: Option<bool>,
    pub(crate) scan_consistency: Option<ScanConsistency>,
    pub(crate) scan_wait: Option<Duration>,
    pub(crate) deserializer: Option<Arc<dyn Deserializer>>,
    pub(crate) max_retries: Option<u32>,

    pub(crate) positional_parameters: Option<Vec<Value>>,
    pub(crate) named_parameters: Option<HashMap<String, Value>>,
    pub(crate) raw: Option<HashMap<String, Value>>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn client_context_id(mut self, client_context_id: impl Into<String>) -> Self {
        self.client_context_id = Some(client_context_id.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn scan_consistency(mut self, scan_consistency: ScanConsistency) -> Self {
        self.scan_consistency = Some(scan_consistency);
        self
    }

    /// Maximum staleness wait; only sent when scan consistency is bounded.
    pub fn scan_wait(mut self, scan_wait: Duration) -> Self {
        self.scan_wait = Some(scan_wait);
        self
    }

    /// Overrides the cluster's deserializer for this query's rows.
    pub fn deserializer(mut self, deserializer: Arc<dyn Deserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }

    /// Overrides the cluster's retry budget for this query.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn positional_parameters(mut self, positional_parameters: Vec<Value>) -> Self {
        self.positional_parameters = Some(positional_parameters);
        self
    }

    pub fn add_positional_parameter(mut self, parameter: Value) -> Self {
        self.positional_parameters
            .get_or_insert_with(Vec::new)
            .push(parameter);
        self
    }

    pub fn named_parameters(mut self, named_parameters: HashMap<String, Value>) -> Self {
        self.named_parameters = Some(named_parameters);
        self
    }

    pub fn add_named_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.named_parameters
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Arbitrary name-value pairs merged into the request JSON. An escape
    /// hatch for options this client does not model.
    pub fn raw(mut self, raw: HashMap<String, Value>) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn add_raw(mut self, key: impl Into<String>, value: Value) -> Self {
        self.raw.get_or_insert_with(HashMap::new).insert(key.into(), value);
        self
    }
}
