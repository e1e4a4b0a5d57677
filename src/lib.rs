//! `courier-http` is an async outbound HTTP client that layers call
//! logging, bounded retry and request-context header propagation over a
//! pluggable transport.
//!
//! Requests flow through a decorator chain:
//! [`CourierClient`] → [`RetryTransport`] → [`LoggingTransport`] → primitive
//! ([`HttpTransport`] by default). Every outcome is classified into a
//! [`CallResponse`] or a [`CourierError`].

mod client;
mod context;
mod endpoint;
mod error;
mod logging;
mod options;
mod propagation;
mod retry;
mod transport;
mod types;
mod wire;

pub use client::CourierClient;
pub use context::{CancelReason, CancelToken, RequestContext};
pub use endpoint::{build_url, parse_absolute_url};
pub use error::{CourierError, TransportError, UpstreamError, INTERNAL_ERROR_CODE};
pub use logging::LoggingTransport;
pub use options::ClientOptions;
pub use propagation::{extract_from_context, inject_into_context, WellKnownKey};
pub use retry::{RetryPolicy, RetryTransport};
pub use transport::{HttpResponse, HttpTransport, OutgoingRequest, Transport};
pub use types::{CallResponse, CallResult, ClientConfig};

pub type Result<T> = std::result::Result<T, CourierError>;
