pub(crate) mod query_client;
