use crate::{CallResult, CancelReason, HttpResponse};

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// Target URL is malformed or not absolute. Raised before any I/O.
    #[error("bad url {url}: {reason}")]
    BadUrl { url: String, reason: String },
    /// A default or per-call header has an invalid name or value.
    #[error("invalid header {name}")]
    InvalidHeader { name: String },
    /// One header layer names the same header twice, differing only in case.
    /// `name` is the lowercased header name.
    #[error("duplicate header {name}")]
    DuplicateHeader { name: String },
    /// Request body could not be serialized.
    #[error("encode error: {0}")]
    Encode(serde_json::Error),
    /// Send failed without a response reaching the client.
    #[error("transport error: {0}")]
    Transport(TransportError),
    /// The call was cancelled, or its deadline passed, while waiting to retry.
    #[error("call cancelled: {reason}")]
    Cancelled {
        reason: CancelReason,
        /// Response of the last completed attempt, if there was one.
        response: Option<CallResult>,
    },
    /// Response received but classified as a failure.
    #[error("upstream error {}: {}", .0.status_code, .0.message)]
    Upstream(Box<UpstreamError>),
}

impl CourierError {
    /// Best-effort partial result of the failing call.
    pub fn response(&self) -> Option<&CallResult> {
        match self {
            CourierError::Upstream(err) => Some(&err.response),
            CourierError::Cancelled { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    pub fn is_bad_url(&self) -> bool {
        matches!(self, CourierError::BadUrl { .. })
    }
}

impl From<TransportError> for CourierError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled {
                reason,
                last_response,
            } => CourierError::Cancelled {
                reason,
                response: last_response.as_deref().map(CallResult::from_response),
            },
            other => CourierError::Transport(other),
        }
    }
}

/// Failure of a [`Transport`](crate::Transport) send.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network or request execution error from `reqwest`.
    #[error("{0}")]
    Network(reqwest::Error),
    /// The in-flight exchange was abandoned because the call context fired.
    #[error("request interrupted: {0}")]
    Interrupted(CancelReason),
    /// The context fired during the wait between retry attempts.
    #[error("retry wait cancelled: {reason}")]
    Cancelled {
        reason: CancelReason,
        last_response: Option<Box<HttpResponse>>,
    },
    /// Failure reported by a custom transport.
    #[error("{0}")]
    Other(String),
}

/// Code attached to errors synthesized for undecodable success bodies.
pub const INTERNAL_ERROR_CODE: &str = "internal_error";

/// Failing outcome of a completed round trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamError {
    /// Upstream status, or 500 when a success body failed to decode.
    pub status_code: u16,
    /// Error code from the structured payload, if any.
    pub code: Option<String>,
    pub message: String,
    /// The response that produced this error.
    pub response: CallResult,
}
