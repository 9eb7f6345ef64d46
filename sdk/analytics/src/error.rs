pub use couchbase_analytics_core::analyticsx::error::{
    Error, ErrorDesc, ErrorKind, Result, ServerError, ServerErrorKind,
};
