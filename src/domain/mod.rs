//! Value types shared between the conversion pipeline and the HTTP surface.

use bytes::Bytes;

/// How the document payload arrived at the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Structured submission: `{"html": <text>}`.
    Json,
    /// The request body itself is the document.
    Raw,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadKind::Json => "json",
            PayloadKind::Raw => "raw",
        }
    }
}

/// One inbound conversion request. Owned by exactly one
/// [`ConvertService::convert`](crate::application::convert::ConvertService::convert)
/// invocation and dropped when it returns.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    payload: Bytes,
    kind: PayloadKind,
}

impl ConversionRequest {
    pub fn new(payload: impl Into<Bytes>, kind: PayloadKind) -> Self {
        Self {
            payload: payload.into(),
            kind,
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// The binary output of one successful conversion, ready for transport.
#[derive(Debug, Clone)]
pub struct Artifact {
    bytes: Bytes,
    size: u64,
}

impl Artifact {
    pub fn new(bytes: Bytes) -> Self {
        let size = bytes.len() as u64;
        Self { bytes, size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}
