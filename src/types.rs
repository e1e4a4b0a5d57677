use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::HttpResponse;

/// Status and headers of a completed round trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallResult {
    /// e.g. `"200 OK"`.
    pub status: String,
    pub status_code: u16,
    pub headers: HeaderMap,
}

impl CallResult {
    pub(crate) fn from_response(response: &HttpResponse) -> Self {
        let status = match response.status.canonical_reason() {
            Some(reason) => format!("{} {reason}", response.status.as_u16()),
            None => response.status.as_u16().to_string(),
        };
        Self {
            status,
            status_code: response.status.as_u16(),
            headers: response.headers.clone(),
        }
    }
}

/// Successful call: round-trip metadata plus the decoded body.
#[derive(Clone, Debug, PartialEq)]
pub struct CallResponse<T> {
    pub call: CallResult,
    pub body: T,
}

/// Effective client configuration, see [`CourierClient::config`](crate::CourierClient::config).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}
