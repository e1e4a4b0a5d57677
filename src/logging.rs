use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use reqwest::Url;

use crate::{HttpResponse, OutgoingRequest, Transport, TransportError, WellKnownKey};

/// Decorator that records the start and end of every send.
///
/// The "starting" record is emitted before the inner send begins and the
/// "ended" record after it returns. The inner outcome is passed through
/// untouched.
pub struct LoggingTransport {
    inner: Arc<dyn Transport>,
}

impl LoggingTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn send(&self, request: &OutgoingRequest) -> Result<HttpResponse, TransportError> {
        let path = request.url().path();
        let host = authority(request.url());
        let host = host.as_str();
        let request_id = request.header_str(WellKnownKey::RequestId.header_name());

        let started = Instant::now();
        tracing::debug!(path, host, request_id, "call starting");

        let result = self.inner.send(request).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(response) => tracing::debug!(
                path,
                host,
                duration_ms,
                status = response.status.as_u16(),
                request_id,
                "call ended"
            ),
            Err(err) => tracing::debug!(
                path,
                host,
                duration_ms,
                error = %err,
                request_id,
                "call ended"
            ),
        }

        result
    }
}

/// `host` or `host:port` when the URL names a non-default port.
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}
