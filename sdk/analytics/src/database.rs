use crate::clients::query_client::QueryClient;
use crate::scope::Scope;
use std::sync::Arc;

#[derive(Clone)]
pub struct Database {
    client: Arc<QueryClient>,
    name: String,
}

impl Database {
    pub(crate) fn new(client: Arc<QueryClient>, name: String) -> Self {
        Self { client, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self, name: impl Into<String>) -> Scope {
        Scope::new(self.client.clone(), self.name.clone(), name.into())
    }
}
