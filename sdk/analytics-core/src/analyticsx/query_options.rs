use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ScanConsistency {
    NotBounded,
    RequestPlus,
}

/// Options for one caller invocation. Fields marked `skip_serializing` are
/// injected into the request body by hand (see `Analytics::build_body`), the
/// rest serialize straight into it.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct QueryOptions<'a> {
    pub statement: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_context_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_context: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "readonly")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_consistency: Option<ScanConsistency>,
    #[serde(skip_serializing)]
    pub scan_wait: Option<Duration>,

    #[serde(skip_serializing)]
    pub args: Option<&'a [Value]>,
    #[serde(skip_serializing)]
    pub named_args: Option<&'a HashMap<String, Value>>,
    #[serde(skip_serializing)]
    pub raw: Option<&'a HashMap<String, Value>>,

    // Overall budget for the retry loop; also derives the per-attempt
    // transport timeout and the server-side timeout.
    #[serde(skip_serializing)]
    pub timeout: Duration,
    #[serde(skip_serializing)]
    pub max_retries: Option<u32>,
}

impl<'a> QueryOptions<'a> {
    pub fn new(statement: &'a str, timeout: Duration) -> Self {
        Self {
            statement,
            client_context_id: None,
            query_context: None,
            read_only: None,
            scan_consistency: None,
            scan_wait: None,

            args: None,
            named_args: None,
            raw: None,

            timeout,
            max_retries: None,
        }
    }

    pub fn client_context_id(mut self, client_context_id: impl Into<Option<&'a str>>) -> Self {
        self.client_context_id = client_context_id.into();
        self
    }

    pub fn query_context(mut self, query_context: impl Into<Option<&'a str>>) -> Self {
        self.query_context = query_context.into();
        self
    }

    pub fn read_only(mut self, read_only: impl Into<Option<bool>>) -> Self {
        self.read_only = read_only.into();
        self
    }

    pub fn scan_consistency(
        mut self,
        scan_consistency: impl Into<Option<ScanConsistency>>,
    ) -> Self {
        self.scan_consistency = scan_consistency.into();
        self
    }

    pub fn scan_wait(mut self, scan_wait: impl Into<Option<Duration>>) -> Self {
        self.scan_wait = scan_wait.into();
        self
    }

    pub fn args(mut self, args: impl Into<Option<&'a [Value]>>) -> Self {
        self.args = args.into();
        self
    }

    pub fn named_args(mut self, named_args: impl Into<Option<&'a HashMap<String, Value>>>) -> Self {
        self.named_args = named_args.into();
        self
    }

    pub fn raw(mut self, raw: impl Into<Option<&'a HashMap<String, Value>>>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn max_retries(mut self, max_retries: impl Into<Option<u32>>) -> Self {
        self.max_retries = max_retries.into();
        self
    }
}
