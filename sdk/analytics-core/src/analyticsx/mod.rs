pub mod error;
pub mod query;
pub mod query_options;
pub mod query_result;
pub mod response_json;
pub mod response_parser;
