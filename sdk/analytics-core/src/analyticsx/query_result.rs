use bytes::Bytes;

/// Sibling fields captured from the response document, still in wire form.
/// Decoding happens lazily in the result types built on top of this.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub request_id: Option<String>,
    pub client_context_id: Option<String>,
    pub status: Option<String>,
    pub signature: Option<Bytes>,
    pub plans: Option<Bytes>,
    pub metrics: Option<Bytes>,
    pub warnings: Option<Bytes>,
}
