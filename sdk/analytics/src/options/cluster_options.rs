use crate::deserializer::Deserializer;
use crate::options::security_options::SecurityOptions;
use std::sync::Arc;
use std::time::Duration;

/// Options shared by every query issued through one [`crate::Cluster`].
/// The builder is consumed when the cluster is created; per-query options
/// can override the deserializer, timeout, and retry budget.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct ClusterOptions {
    pub(crate) timeout: TimeoutOptions,
    pub(crate) security: SecurityOptions,
    pub(crate) deserializer: Option<Arc<dyn Deserializer>>,
    pub(crate) max_retries: Option<u32>,
}

impl ClusterOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn timeout(mut self, timeout: TimeoutOptions) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn security(mut self, security: SecurityOptions) -> Self {
        self.security = security;
        self
    }

    pub fn deserializer(mut self, deserializer: Arc<dyn Deserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }

    /// Bounds how often a failed retriable request is retried.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TimeoutOptions {
    pub(crate) query_timeout: Duration,
    pub(crate) connect_timeout: Duration,
}

impl TimeoutOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl Default for TimeoutOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10 * 60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
