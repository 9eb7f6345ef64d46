use crate::analyticsx::error::{self, Error, ErrorKind, ServerError, ServerErrorKind};
use crate::analyticsx::query_options::{QueryOptions, ScanConsistency};
use crate::analyticsx::query_result::RawMetadata;
use crate::analyticsx::response_parser::ResponseParser;
use crate::helpers::backoff::BackoffCalculator;
use crate::helpers::deadline::Deadline;
use crate::helpers::durations::encode_duration_to_ms;
use crate::httpx;
use crate::httpx::client::Client;
use crate::httpx::request::{Auth, Request};
use bytes::Bytes;
use futures::StreamExt;
use http::{Method, StatusCode};
use log::debug;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

const SERVER_TIMEOUT_PADDING: Duration = Duration::from_secs(5);

// The code the analytics service uses for "service not available", reused for
// the synthetic error when an intermediary returns 503 with no query response.
const SERVICE_NOT_AVAILABLE_CODE: u32 = 23000;

/// What the row handler wants the engine to do after a row was delivered.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RowAction {
    Continue,
    /// Abort the query: the in-flight call is dropped and a cancelled error
    /// surfaces. No further rows are delivered.
    Stop,
}

pub type RowHandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type RowHandler<'a> =
    dyn FnMut(Bytes) -> std::result::Result<RowAction, RowHandlerError> + Send + 'a;

#[derive(Debug)]
pub struct Analytics<C: Client> {
    pub http_client: Arc<C>,
    pub user_agent: String,
    pub endpoint: String,
    pub auth: Auth,
    pub backoff: BackoffCalculator,
}

impl<C: Client> Analytics<C> {
    /// Runs a query, retrying retriable failures with backoff until the
    /// caller's timeout budget runs out. Rows are delivered to `on_row` in
    /// wire order, each at most once across all attempts.
    pub async fn query(
        &self,
        opts: &QueryOptions<'_>,
        on_row: &mut RowHandler<'_>,
    ) -> error::Result<RawMetadata> {
        let deadline = Deadline::of(opts.timeout);
        let delivered = AtomicBool::new(false);

        let mut prev_error: Option<Error> = None;
        let mut attempt_timeout = opts.timeout;
        let mut attempt = 0u32;

        loop {
            let mut handler = |row: Bytes| {
                delivered.store(true, Ordering::Relaxed);
                on_row(row)
            };

            let err = match self.query_once(opts, attempt_timeout, &mut handler).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => e,
            };

            // Once a row has reached the caller the attempt is committed:
            // retrying would deliver rows twice.
            if !err.is_retriable() || delivered.load(Ordering::Relaxed) {
                return Err(attach_prev(err, prev_error));
            }
            if let Some(max_retries) = opts.max_retries {
                if attempt >= max_retries {
                    return Err(attach_prev(err, prev_error));
                }
            }

            let delay = self.backoff.delay_for_attempt(attempt);
            if !deadline.has_remaining(delay) {
                return Err(Error::new_timeout_error(
                    "declaring timeout early because sleeping for the backoff delay would exceed the timeout deadline",
                )
                .with_retried(err));
            }

            debug!(
                "Query attempt {attempt} failed with a retriable error ({err}); retrying in {delay:?}"
            );
            prev_error = Some(err);

            sleep(delay).await;

            attempt_timeout = match deadline.remaining() {
                Some(remaining) => remaining,
                None => {
                    return Err(attach_prev(
                        Error::new_timeout_error(
                            "query execution did not complete within the timeout",
                        ),
                        prev_error,
                    ));
                }
            };
            attempt += 1;
        }
    }

    /// One send/receive cycle. On exit the pooled connections are evicted
    /// unless the attempt parsed cleanly or failed inside the caller's row
    /// handler; any other failure might be tied to a degraded node.
    pub async fn query_once(
        &self,
        opts: &QueryOptions<'_>,
        timeout: Duration,
        on_row: &mut RowHandler<'_>,
    ) -> error::Result<RawMetadata> {
        let (body, client_context_id) = self.build_body(opts, timeout)?;
        let req = self.new_request(body, timeout);

        let res = self
            .attempt(req, opts.statement, &client_context_id, on_row)
            .await;

        let allow_connection_reuse = match &res {
            Ok(_) => true,
            Err(e) => matches!(e.kind(), ErrorKind::RowCallback),
        };
        if !allow_connection_reuse {
            debug!("Clearing the connection pool to avoid reusing a connection to a potentially degraded node");
            if let Err(e) = self.http_client.evict_pooled_connections() {
                debug!("Failed to evict pooled connections: {e}");
            }
        }

        res
    }

    async fn attempt(
        &self,
        req: Request,
        statement: &str,
        client_context_id: &str,
        on_row: &mut RowHandler<'_>,
    ) -> error::Result<RawMetadata> {
        let res = self
            .http_client
            .execute(req)
            .await
            .map_err(|e| self.convert_http_error(e, statement, client_context_id))?;

        let status_code = res.status();
        if status_code == StatusCode::UNAUTHORIZED {
            return Err(Error::new_invalid_credentials_error(&self.endpoint));
        }

        let mut parser = ResponseParser::new(
            &self.endpoint,
            statement,
            Some(client_context_id.to_string()),
            status_code,
        );

        let mut stream = res.bytes_stream();
        let parse_result: error::Result<()> = 'parse: {
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        break 'parse Err(self.convert_http_error(
                            e,
                            statement,
                            client_context_id,
                        ))
                    }
                };
                parser.push(&chunk);
                loop {
                    let row = match parser.next_row() {
                        Ok(Some(row)) => row,
                        Ok(None) => break,
                        Err(e) => break 'parse Err(e),
                    };
                    match on_row(row) {
                        Ok(RowAction::Continue) => {}
                        Ok(RowAction::Stop) => {
                            break 'parse Err(Error::new_cancelled_error(
                                "the query was cancelled by the row handler",
                            ));
                        }
                        Err(cause) => break 'parse Err(Error::new_row_callback_error(cause)),
                    }
                }
            }
            parser.end_of_input()
        };

        if let Err(e) = parse_result {
            // A 503 whose body is not a query response likely came from a
            // proxy or load balancer; report it like the server's own
            // "service not available" so the retry loop engages.
            if status_code == StatusCode::SERVICE_UNAVAILABLE
                && matches!(e.kind(), ErrorKind::Protocol { .. })
            {
                return Err(self.synthetic_service_not_available(statement, client_context_id));
            }
            return Err(e);
        }

        let raw = parser.into_metadata();
        if raw.request_id.is_none() {
            if status_code == StatusCode::SERVICE_UNAVAILABLE {
                return Err(self.synthetic_service_not_available(statement, client_context_id));
            }
            return Err(Error::new_protocol_error(format!(
                "the response body did not match the expected query response format; HTTP status: {status_code}"
            )));
        }

        Ok(raw)
    }

    fn new_request(&self, body: Bytes, timeout: Duration) -> Request {
        Request::new(Method::POST, format!("{}/api/v1/request", self.endpoint))
            .auth(self.auth.clone())
            .user_agent(self.user_agent.clone())
            .content_type("application/json".to_string())
            .timeout(timeout)
            .body(body)
    }

    fn build_body(
        &self,
        opts: &QueryOptions<'_>,
        timeout: Duration,
    ) -> error::Result<(Bytes, String)> {
        // Generating the random id this late means each retry gets a new one.
        let client_context_id = match opts.client_context_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let mut body = serde_json::to_value(opts)
            .map_err(|e| Error::new_encoding_error(format!("failed to encode options: {e}")))?;
        let obj = match body.as_object_mut() {
            Some(obj) => obj,
            None => {
                return Err(Error::new_encoding_error(
                    "query options did not encode to an object",
                ))
            }
        };

        obj.insert(
            "client_context_id".to_string(),
            Value::String(client_context_id.clone()),
        );

        // Give the server a little longer than the client, so a server-side
        // timeout produces a structured error before the local one fires.
        let server_timeout = timeout + SERVER_TIMEOUT_PADDING;
        obj.insert(
            "timeout".to_string(),
            Value::String(encode_duration_to_ms(server_timeout)),
        );

        if let Some(scan_wait) = opts.scan_wait {
            let bounded = opts
                .scan_consistency
                .is_some_and(|sc| sc != ScanConsistency::NotBounded);
            if bounded {
                obj.insert(
                    "scan_wait".to_string(),
                    Value::String(encode_duration_to_ms(scan_wait)),
                );
            }
        }

        if let Some(args) = opts.args {
            if !args.is_empty() {
                obj.insert("args".to_string(), Value::Array(args.to_vec()));
            }
        }

        if let Some(named_args) = opts.named_args {
            for (k, v) in named_args.iter() {
                let key = if k.starts_with('$') {
                    k.clone()
                } else {
                    format!("${k}")
                };
                obj.insert(key, v.clone());
            }
        }

        if let Some(raw) = opts.raw {
            for (k, v) in raw.iter() {
                obj.insert(k.clone(), v.clone());
            }
        }

        let body = serde_json::to_vec(&body)
            .map_err(|e| Error::new_encoding_error(format!("failed to encode request: {e}")))?;

        Ok((Bytes::from(body), client_context_id))
    }

    fn convert_http_error(
        &self,
        e: httpx::error::Error,
        statement: &str,
        client_context_id: &str,
    ) -> Error {
        if e.is_timeout_error() {
            Error::new_timeout_error(format!("the HTTP request timed out: {e}"))
                .with(Arc::new(e))
        } else if e.is_tls_handshake_error() {
            Error::new_tls_handshake_error(self.tls_handshake_error_message(&e)).with(Arc::new(e))
        } else {
            Error::new_http_error(
                &self.endpoint,
                statement.to_string(),
                client_context_id.to_string(),
            )
            .with(Arc::new(e))
        }
    }

    fn tls_handshake_error_message(&self, cause: &httpx::error::Error) -> String {
        let msg = format!(
            "A TLS handshake problem prevented the client from connecting to the server. \
             Potential causes include the server (or a proxy, or an on-path attacker) \
             presenting a certificate the client is not configured to trust. \
             If connecting from inside a corporate network, make sure the client trusts \
             the CA certificate of your proxy. Error message from the TLS engine: {cause}"
        );

        if self.endpoint.contains(".nonprod-project-avengers.com") {
            format!(
                "It looks like you might be connecting to a Couchbase internal non-production \
                 deployment. If this is true, please make sure the client is configured to \
                 trust the non-prod certificate authority. {msg}"
            )
        } else {
            msg
        }
    }

    fn synthetic_service_not_available(&self, statement: &str, client_context_id: &str) -> Error {
        let server_error = ServerError::new(
            ServerErrorKind::TemporaryFailure,
            &self.endpoint,
            StatusCode::SERVICE_UNAVAILABLE,
            SERVICE_NOT_AVAILABLE_CODE,
            "Got HTTP status 503 Service Unavailable, but there was no analytics response body. \
             This might indicate the HTTP response came from a proxy or load balancer.",
            true,
        )
        .with_statement(statement)
        .with_client_context_id(client_context_id);

        Error::new_server_error(server_error)
    }
}

fn attach_prev(err: Error, prev: Option<Error>) -> Error {
    match prev {
        Some(prev) => err.with_retried(prev),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::httpx::error::Result as HttpxResult;
    use crate::httpx::request::BasicAuth;
    use crate::httpx::response::Response;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct NoopClient;

    #[async_trait]
    impl Client for NoopClient {
        async fn execute(&self, _req: Request) -> HttpxResult<Response> {
            unimplemented!("not exercised by request assembly tests")
        }

        fn evict_pooled_connections(&self) -> HttpxResult<()> {
            Ok(())
        }
    }

    fn analytics() -> Analytics<NoopClient> {
        Analytics {
            http_client: Arc::new(NoopClient),
            user_agent: "test-agent".to_string(),
            endpoint: "http://127.0.0.1:8095".to_string(),
            auth: Auth::BasicAuth(BasicAuth::new("user", "pass")),
            backoff: BackoffCalculator::default(),
        }
    }

    fn body_json(opts: &QueryOptions<'_>) -> Value {
        let (body, _) = analytics()
            .build_body(opts, Duration::from_secs(60))
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn body_carries_statement_and_padded_server_timeout() {
        let opts = QueryOptions::new("SELECT 1", Duration::from_secs(60));
        let body = body_json(&opts);
        assert_eq!(body["statement"], json!("SELECT 1"));
        assert_eq!(body["timeout"], json!("65000ms"));
    }

    #[test]
    fn client_context_id_is_fresh_per_build() {
        let opts = QueryOptions::new("SELECT 1", Duration::from_secs(60));
        let first = body_json(&opts)["client_context_id"].clone();
        let second = body_json(&opts)["client_context_id"].clone();
        assert_ne!(first, second);
    }

    #[test]
    fn pinned_client_context_id_is_kept() {
        let opts =
            QueryOptions::new("SELECT 1", Duration::from_secs(60)).client_context_id("my-id");
        assert_eq!(body_json(&opts)["client_context_id"], json!("my-id"));
    }

    #[test]
    fn positional_parameters_roundtrip() {
        let args = vec![
            json!("hello world"),
            json!(42),
            json!(1.5),
            json!(true),
            json!(null),
            json!({"nested": {"list": [1, 2, 3]}}),
            json!([1, "two", null]),
        ];
        let opts = QueryOptions::new("SELECT 1", Duration::from_secs(60)).args(args.as_slice());
        assert_eq!(body_json(&opts)["args"], Value::Array(args.clone()));
    }

    #[test]
    fn empty_positional_parameters_are_omitted() {
        let args: Vec<Value> = vec![];
        let opts = QueryOptions::new("SELECT 1", Duration::from_secs(60)).args(args.as_slice());
        assert!(body_json(&opts).get("args").is_none());
    }

    #[test]
    fn named_parameters_gain_dollar_prefix_once() {
        let mut named = HashMap::new();
        named.insert("name".to_string(), json!("value"));
        named.insert("$already".to_string(), json!(7));
        let opts = QueryOptions::new("SELECT 1", Duration::from_secs(60)).named_args(&named);

        let body = body_json(&opts);
        assert_eq!(body["$name"], json!("value"));
        assert_eq!(body["$already"], json!(7));
        assert!(body.get("name").is_none());
        assert!(body.get("$$already").is_none());
    }

    #[test]
    fn scan_wait_requires_bounded_consistency() {
        let base = QueryOptions::new("SELECT 1", Duration::from_secs(60))
            .scan_wait(Duration::from_secs(2));
        assert!(body_json(&base).get("scan_wait").is_none());

        let not_bounded = base.clone().scan_consistency(ScanConsistency::NotBounded);
        let body = body_json(&not_bounded);
        assert_eq!(body["scan_consistency"], json!("not_bounded"));
        assert!(body.get("scan_wait").is_none());

        let request_plus = base.scan_consistency(ScanConsistency::RequestPlus);
        let body = body_json(&request_plus);
        assert_eq!(body["scan_consistency"], json!("request_plus"));
        assert_eq!(body["scan_wait"], json!("2000ms"));
    }

    #[test]
    fn read_only_and_query_context_are_optional() {
        let plain = QueryOptions::new("SELECT 1", Duration::from_secs(60));
        let body = body_json(&plain);
        assert!(body.get("readonly").is_none());
        assert!(body.get("query_context").is_none());

        let scoped = QueryOptions::new("SELECT 1", Duration::from_secs(60))
            .read_only(true)
            .query_context("default:`travel`.`inventory`");
        let body = body_json(&scoped);
        assert_eq!(body["readonly"], json!(true));
        assert_eq!(body["query_context"], json!("default:`travel`.`inventory`"));
    }

    #[test]
    fn raw_options_merge_at_top_level() {
        let mut raw = HashMap::new();
        raw.insert("pretty".to_string(), json!(true));
        let opts = QueryOptions::new("SELECT 1", Duration::from_secs(60)).raw(&raw);
        assert_eq!(body_json(&opts)["pretty"], json!(true));
    }
}
