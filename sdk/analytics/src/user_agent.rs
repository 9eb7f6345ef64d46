use lazy_static::lazy_static;
use uuid::Uuid;

lazy_static! {
    // One id per process, so requests from the same client instance can be
    // correlated server-side.
    static ref PROCESS_ID: String = Uuid::new_v4().to_string();
}

/// User-Agent per RFC 7231 section 5.5.3: product/version plus comments
/// describing the runtime and platform.
pub(crate) fn user_agent() -> String {
    format!(
        "couchbase-analytics-rust/{} (id={}; rust; {}/{})",
        env!("CARGO_PKG_VERSION"),
        *PROCESS_ID,
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}
