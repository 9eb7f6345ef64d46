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

use crate::clients::query_client::QueryClient;
use crate::credential::Credential;
use crate::database::Database;
use crate::error::Result;
use crate::options::cluster_options::ClusterOptions;
use crate::options::query_options::QueryOptions;
use crate::results::query_results::{QueryMetadata, QueryResult};
use crate::results::row::Row;
use crate::{RowAction, RowHandlerError};
use std::sync::Arc;

/// Entry point of the client. One cluster owns one query executor and one
/// HTTP transport; clones share both.
#[derive(Clone)]
pub struct Cluster {
    client: Arc<QueryClient>,
}

impl Cluster {
    /// Creates a cluster from a connection string like
    /// `https://analytics.example.com:18095?timeout.query_timeout=5m`.
    pub fn new_instance(
        connection_string: impl AsRef<str>,
        credential: Credential,
        options: impl Into<Option<ClusterOptions>>,
    ) -> Result<Cluster> {
        let options = options.into().unwrap_or_default();
        let client = QueryClient::connect(connection_string.as_ref(), credential, options)?;
        Ok(Cluster {
            client: Arc::new(client),
        })
    }

    pub fn database(&self, name: impl Into<String>) -> Database {
        Database::new(self.client.clone(), name.into())
    }

    /// Executes a query and buffers all rows in memory.
    pub async fn execute_query(
        &self,
        statement: impl AsRef<str>,
        opts: impl Into<Option<QueryOptions>>,
    ) -> Result<QueryResult> {
        self.client
            .execute_query(None, statement.as_ref(), opts.into())
            .await
    }

    /// Executes a query, delivering rows to `on_row` in wire order as they
    /// arrive. Metadata is returned once the final row has been consumed.
    pub async fn execute_streaming_query<F>(
        &self,
        statement: impl AsRef<str>,
        on_row: F,
        opts: impl Into<Option<QueryOptions>>,
    ) -> Result<QueryMetadata>
    where
        F: FnMut(Row) -> std::result::Result<RowAction, RowHandlerError> + Send,
    {
        self.client
            .execute_streaming_query(None, statement.as_ref(), on_row, opts.into())
            .await
    }

    /// Replaces the credential used for new requests. The new credential
    /// must be of the same kind as the current one.
    pub fn rotate_credential(&self, credential: Credential) -> Result<()> {
        self.client.rotate_credential(credential)
    }

    /// Releases pooled connections. Requests already in flight drain
    /// normally; new requests open fresh connections.
    pub fn close(&self) {
        self.client.close()
    }
}
