use crate::clients::query_client::QueryClient;
use crate::error::Result;
use crate::options::query_options::QueryOptions;
use crate::query_context::QueryContext;
use crate::results::query_results::{QueryMetadata, QueryResult};
use crate::results::row::Row;
use crate::{RowAction, RowHandlerError};
use std::sync::Arc;

/// A scope within a database. Queries issued here carry a query context of
/// `default:`db`.`scope``, so statements may use unqualified names.
#[derive(Clone)]
pub struct Scope {
    client: Arc<QueryClient>,
    database_name: String,
    name: String,
}

impl Scope {
    pub(crate) fn new(client: Arc<QueryClient>, database_name: String, name: String) -> Self {
        Self {
            client,
            database_name,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub async fn execute_query(
        &self,
        statement: impl AsRef<str>,
        opts: impl Into<Option<QueryOptions>>,
    ) -> Result<QueryResult> {
        let query_context = QueryContext::new(&self.database_name, &self.name)?;
        self.client
            .execute_query(Some(&query_context), statement.as_ref(), opts.into())
            .await
    }

    pub async fn execute_streaming_query<F>(
        &self,
        statement: impl AsRef<str>,
        on_row: F,
        opts: impl Into<Option<QueryOptions>>,
    ) -> Result<QueryMetadata>
    where
        F: FnMut(Row) -> std::result::Result<RowAction, RowHandlerError> + Send,
    {
        let query_context = QueryContext::new(&self.database_name, &self.name)?;
        self.client
            .execute_streaming_query(Some(&query_context), statement.as_ref(), on_row, opts.into())
            .await
    }
}
