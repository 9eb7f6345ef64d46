/*
 *
 *  * Copyright (c) 2025 Couchbase, Inc.
 *  *
 *  * Licensed under the Apache License, Version 2.0 (the "License");
 *  * you may not use this file except in compliance with the License.
 *  * You may obtain a copy of the License at
 *  *
 *  *    http://www.apache.org/licenses/LICENSE-2.0
 *  *
 *  * Unless required by applicable law or agreed to in writing, software
 *  * distributed under the License is distributed on an "AS IS" BASIS,
 *  * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  * See the License for the specific language governing permissions and
 *  * limitations under the License.
 *
 */

use crate::httpx::error::{Error, Result as HttpxResult};
use crate::httpx::request::{Auth, Request};
use crate::httpx::response::Response;
use crate::tls_config::TlsConfig;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::header::{CONTENT_TYPE, USER_AGENT};
use rand::seq::SliceRandom;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::Policy;
use std::error::Error as StdError;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

#[async_trait]
pub trait Client: Send + Sync + Debug {
    async fn execute(&self, req: Request) -> HttpxResult<Response>;

    /// Drops every idle pooled connection. There is no API to poison a single
    /// connection, so callers that suspect a degraded node clear the pool.
    fn evict_pooled_connections(&self) -> HttpxResult<()>;
}

#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct ClientConfig {
    pub tls_config: Option<TlsConfig>,
    pub connect_timeout: Option<Duration>,
    pub idle_connection_timeout: Option<Duration>,
    pub max_idle_connections_per_host: Option<usize>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn tls_config(mut self, tls_config: impl Into<Option<TlsConfig>>) -> Self {
        self.tls_config = tls_config.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn idle_connection_timeout(mut self, timeout: Duration) -> Self {
        self.idle_connection_timeout = Some(timeout);
        self
    }

    pub fn max_idle_connections_per_host(mut self, max_idle_connections_per_host: usize) -> Self {
        self.max_idle_connections_per_host = Some(max_idle_connections_per_host);
        self
    }
}

#[derive(Debug)]
pub struct ReqwestClient {
    inner: ArcSwap<reqwest::Client>,
    config: ClientConfig,
    client_id: String,
}

impl ReqwestClient {
    pub fn new(config: ClientConfig) -> HttpxResult<Self> {
        let inner = Self::new_client(&config)?;

        Ok(Self {
            inner: ArcSwap::from_pointee(inner),
            config,
            client_id: Uuid::new_v4().to_string(),
        })
    }

    fn new_client(config: &ClientConfig) -> HttpxResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::limited(10))
            .dns_resolver(Arc::new(ShufflingDns {}));

        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.idle_connection_timeout {
            builder = builder.pool_idle_timeout(timeout);
        }
        if let Some(max_idle) = config.max_idle_connections_per_host {
            builder = builder.pool_max_idle_per_host(max_idle);
        }
        if let Some(tls_config) = &config.tls_config {
            // We have to deref the Arc, otherwise we'll get a runtime error from reqwest.
            builder = builder.use_preconfigured_tls((**tls_config).clone());
        }

        builder
            .build()
            .map_err(|e| Error::new_message_error(format!("failed to build http client: {e}")))
    }
}

#[async_trait]
impl Client for ReqwestClient {
    async fn execute(&self, req: Request) -> HttpxResult<Response> {
        let inner = self.inner.load();

        let id = if let Some(unique_id) = req.unique_id {
            unique_id
        } else {
            Uuid::new_v4().to_string()
        };

        trace!(
            "Writing request on {} to {}. Method={}. Request id={}",
            &self.client_id,
            &req.uri,
            &req.method,
            &id
        );

        let mut builder = inner.request(req.method, req.uri);

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        if let Some(content_type) = req.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }

        if let Some(user_agent) = req.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }

        if let Some(timeout) = req.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(auth) = &req.auth {
            match auth {
                Auth::BasicAuth(basic) => {
                    builder = builder.basic_auth(&basic.username, Some(&basic.password))
                }
                // Client certificates are presented during the TLS handshake.
                Auth::ClientCertificate => {}
            }
        }

        match builder.send().await {
            Ok(response) => {
                trace!(
                    "Received response on {}. Request id={}. Status: {}",
                    &self.client_id,
                    &id,
                    response.status()
                );
                Ok(Response::from(response))
            }
            Err(err) => {
                let mut msg = format!(
                    "Received error on {}. Request id={}. Err: {}",
                    &self.client_id, &id, &err,
                );
                if let Some(source) = err.source() {
                    msg = format!("{msg}. Source: {source}");
                }
                trace!("{msg}");

                if err.is_timeout() {
                    Err(Error::new_timeout_error(err.to_string()))
                } else if is_tls_handshake_failure(&err) {
                    Err(Error::new_tls_handshake_error(err.to_string()))
                } else if err.is_connect() {
                    Err(Error::new_connection_error(err.to_string()))
                } else if err.is_request() {
                    Err(Error::new_request_error(err.to_string()))
                } else {
                    Err(Error::new_message_error(err.to_string()))
                }
            }
        }
    }

    fn evict_pooled_connections(&self) -> HttpxResult<()> {
        let new_client = Self::new_client(&self.config)?;
        self.inner.store(Arc::new(new_client));

        debug!(
            "Evicted pooled connections on HTTP Client {}",
            &self.client_id
        );

        Ok(())
    }
}

impl Drop for ReqwestClient {
    fn drop(&mut self) {
        debug!("Dropping HTTP Client {}", &self.client_id);
    }
}

fn is_tls_handshake_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Resolves hostnames through the system resolver and shuffles the result,
/// spreading connections across analytics nodes behind one DNS name.
#[derive(Debug)]
struct ShufflingDns {}

impl Resolve for ShufflingDns {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            // The port is ignored; the connector substitutes the real one.
            let addrs = tokio::net::lookup_host((host.as_str(), 0)).await?;
            let mut addrs: Vec<SocketAddr> = addrs.collect();
            addrs.shuffle(&mut rand::thread_rng());
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}
