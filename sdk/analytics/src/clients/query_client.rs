use crate::connstr;
use crate::credential::Credential;
use crate::deserializer::{Deserializer, JsonDeserializer};
use crate::error::{Error, Result};
use crate::options::cluster_options::ClusterOptions;
use crate::options::query_options::QueryOptions;
use crate::options::security_options::build_tls_config;
use crate::query_context::QueryContext;
use crate::results::query_results::{QueryMetadata, QueryResult};
use crate::results::row::Row;
use crate::user_agent::user_agent;
use arc_swap::ArcSwap;
use bytes::Bytes;
use couchbase_analytics_core::analyticsx::query::{Analytics, RowAction, RowHandlerError};
use couchbase_analytics_core::analyticsx::query_options::QueryOptions as CoreQueryOptions;
use couchbase_analytics_core::helpers::backoff::BackoffCalculator;
use couchbase_analytics_core::httpx::client::{Client, ClientConfig, ReqwestClient};
use log::warn;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 7;

/// Owns the transport, the rotatable credential, and the per-cluster query
/// defaults. Shared by the cluster and every database/scope handle.
pub(crate) struct QueryClient {
    http_client: Arc<ReqwestClient>,
    endpoint: String,
    user_agent: String,
    credential: ArcSwap<Credential>,
    default_deserializer: Arc<dyn Deserializer>,
    default_timeout: Duration,
    default_max_retries: u32,
}

impl QueryClient {
    pub(crate) fn connect(
        connection_string: &str,
        credential: Credential,
        options: ClusterOptions,
    ) -> Result<Self> {
        let conn = connstr::parse(connection_string)?;
        let options = connstr::apply_parameters(options, &conn.params)?;

        if !conn.https {
            warn!("Insecure configuration: connection string does not use the `https` scheme.");
        } else if options.security.disable_server_certificate_verification {
            warn!("Insecure configuration: server certificate verification was explicitly disabled.");
        }

        let tls_config = if conn.https {
            Some(build_tls_config(&options.security, &credential)?)
        } else {
            None
        };

        let client_config = ClientConfig::new()
            .tls_config(tls_config)
            .connect_timeout(options.timeout.connect_timeout);
        let http_client = Arc::new(ReqwestClient::new(client_config).map_err(|e| {
            Error::new_invalid_argument_error(
                format!("failed to create HTTP client: {e}"),
                None::<String>,
            )
        })?);

        Ok(Self {
            http_client,
            endpoint: conn.endpoint,
            user_agent: user_agent(),
            credential: ArcSwap::from_pointee(credential),
            default_deserializer: options
                .deserializer
                .unwrap_or_else(|| Arc::new(JsonDeserializer::new())),
            default_timeout: options.timeout.query_timeout,
            default_max_retries: options.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }

    pub(crate) async fn execute_query(
        &self,
        query_context: Option<&QueryContext>,
        statement: &str,
        opts: Option<QueryOptions>,
    ) -> Result<QueryResult> {
        let mut rows = Vec::new();
        let metadata = self
            .execute_streaming_query(
                query_context,
                statement,
                |row| {
                    rows.push(row);
                    Ok(RowAction::Continue)
                },
                opts,
            )
            .await?;
        Ok(QueryResult::new(rows, metadata))
    }

    pub(crate) async fn execute_streaming_query<F>(
        &self,
        query_context: Option<&QueryContext>,
        statement: &str,
        mut on_row: F,
        opts: Option<QueryOptions>,
    ) -> Result<QueryMetadata>
    where
        F: FnMut(Row) -> std::result::Result<RowAction, RowHandlerError> + Send,
    {
        let opts = opts.unwrap_or_default();

        let deserializer = opts
            .deserializer
            .clone()
            .unwrap_or_else(|| self.default_deserializer.clone());
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.max_retries.unwrap_or(self.default_max_retries);

        let core_opts = CoreQueryOptions::new(statement, timeout)
            .client_context_id(opts.client_context_id.as_deref())
            .query_context(query_context.map(|ctx| ctx.format()))
            .read_only(opts.read_only)
            .scan_consistency(opts.scan_consistency.map(Into::into))
            .scan_wait(opts.scan_wait)
            .args(opts.positional_parameters.as_deref())
            .named_args(opts.named_parameters.as_ref())
            .raw(opts.raw.as_ref())
            .max_retries(max_retries);

        let executor = Analytics {
            http_client: self.http_client.clone(),
            user_agent: self.user_agent.clone(),
            endpoint: self.endpoint.clone(),
            auth: self.credential.load().resolve_auth(),
            backoff: BackoffCalculator::default(),
        };

        let mut handler =
            |bytes: Bytes| on_row(Row::new(bytes, deserializer.clone()));
        let raw = executor.query(&core_opts, &mut handler).await?;

        Ok(QueryMetadata::from_raw(raw))
    }

    pub(crate) fn rotate_credential(&self, credential: Credential) -> Result<()> {
        let current = self.credential.load();
        if current.kind() != credential.kind() {
            return Err(Error::new_invalid_argument_error(
                format!(
                    "cannot rotate a {:?} credential to a {:?} credential; TLS key material cannot be reconfigured on an active connection pool",
                    current.kind(),
                    credential.kind()
                ),
                "credential".to_string(),
            ));
        }
        self.credential.store(Arc::new(credential));
        Ok(())
    }

    /// Releases pooled connections. In-flight requests keep their own handle
    /// on the old pool and drain normally.
    pub(crate) fn close(&self) {
        if let Err(e) = self.http_client.evict_pooled_connections() {
            warn!("Failed to release pooled connections on close: {e}");
        }
    }
}
