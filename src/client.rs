use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    endpoint::{build_url, parse_absolute_url},
    error::INTERNAL_ERROR_CODE,
    propagation::extract_from_context,
    wire, CallResponse, CallResult, ClientConfig, ClientOptions, CourierError, HttpResponse,
    HttpTransport, LoggingTransport, OutgoingRequest, RequestContext, Result, RetryTransport,
    Transport, UpstreamError,
};

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Clone)]
/// JSON-over-HTTP client sending through the logging/retry transport chain.
pub struct CourierClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    default_headers: HashMap<String, String>,
    options: ClientOptions,
}

impl fmt::Debug for CourierClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.default_headers.keys().map(String::as_str).collect();
        f.debug_struct("CourierClient")
            .field("base_url", &self.base_url)
            .field("default_headers", &header_names)
            .field("options", &self.options)
            .finish()
    }
}

impl CourierClient {
    /// Creates a client sending through a pooled `reqwest` transport.
    ///
    /// `base_url` may be empty, in which case every call path must be an
    /// absolute URL.
    pub fn new(base_url: impl Into<String>, options: ClientOptions) -> Self {
        Self::with_transport(base_url, options, HttpTransport::new().shared())
    }

    /// Creates a client on top of a custom transport primitive.
    ///
    /// The primitive is wrapped in a [`LoggingTransport`], and that in a
    /// [`RetryTransport`] when `options.retry` is set.
    pub fn with_transport(
        base_url: impl Into<String>,
        options: ClientOptions,
        primitive: Arc<dyn Transport>,
    ) -> Self {
        let logged: Arc<dyn Transport> = Arc::new(LoggingTransport::new(primitive));
        let transport: Arc<dyn Transport> = match &options.retry {
            Some(policy) => Arc::new(RetryTransport::new(logged, policy.clone())),
            None => logged,
        };

        Self {
            transport,
            base_url: base_url.into(),
            default_headers: HashMap::new(),
            options,
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `COURIER_BASE_URL` — base URL prefixed to every call path
    /// - `COURIER_TIMEOUT_MS` — optional call timeout in milliseconds, `0` for none
    ///
    /// # Example
    ///
    /// ```no_run
    /// use courier_http::CourierClient;
    ///
    /// let client = CourierClient::from_env().expect("missing COURIER_* env vars");
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        let base_url = std::env::var("COURIER_BASE_URL")
            .map_err(|_| "missing COURIER_BASE_URL environment variable".to_owned())?;
        if base_url.trim().is_empty() {
            return Err("COURIER_BASE_URL is set but empty".to_owned());
        }

        let mut options = ClientOptions::default();
        if let Ok(raw) = std::env::var("COURIER_TIMEOUT_MS") {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|err| format!("invalid COURIER_TIMEOUT_MS '{raw}': {err}"))?;
            options.timeout = Duration::from_millis(millis);
        }

        Ok(Self::new(base_url.trim(), options))
    }

    /// Sets headers sent with every call. Per-call headers win on conflict.
    pub fn with_default_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.default_headers = headers
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        self
    }

    /// Returns the effective base URL and timeout.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: self.options.timeout,
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        headers: &HashMap<String, String>,
    ) -> Result<CallResponse<T>> {
        self.call(Method::GET, ctx, path, headers, None).await
    }

    pub async fn post<B, T>(
        &self,
        ctx: &RequestContext,
        path: &str,
        headers: &HashMap<String, String>,
        body: &B,
    ) -> Result<CallResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body).map_err(CourierError::Encode)?;
        self.call(Method::POST, ctx, path, headers, Some(body)).await
    }

    pub async fn put<B, T>(
        &self,
        ctx: &RequestContext,
        path: &str,
        headers: &HashMap<String, String>,
        body: &B,
    ) -> Result<CallResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body).map_err(CourierError::Encode)?;
        self.call(Method::PUT, ctx, path, headers, Some(body)).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        ctx: &RequestContext,
        path: &str,
        headers: &HashMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Result<CallResponse<T>> {
        let url = parse_absolute_url(&build_url(&self.base_url, path))?;
        let headers = self.assemble_headers(ctx, headers)?;

        let mut request =
            OutgoingRequest::new(method, url, self.options.call_context(ctx)).with_headers(headers);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.transport.send(&request).await?;
        classify(response)
    }

    /// Layers headers lowest to highest priority: JSON defaults,
    /// context-derived values, client defaults, per-call headers.
    ///
    /// Header names are case-insensitive, so a single layer naming the same
    /// header twice (`X` and `x`) is rejected with `DuplicateHeader`.
    fn assemble_headers(
        &self,
        ctx: &RequestContext,
        per_call: &HashMap<String, String>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let from_context = extract_from_context(ctx);
        for layer in [&from_context, &self.default_headers, per_call] {
            for (name, value) in parse_layer(layer)? {
                if let Some(name) = name {
                    headers.insert(name, value);
                }
            }
        }
        Ok(headers)
    }
}

fn parse_layer(layer: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut parsed = HeaderMap::with_capacity(layer.len());
    for (name, value) in layer {
        let (name, value) = parse_header(name, value)?;
        if parsed.contains_key(&name) {
            return Err(CourierError::DuplicateHeader {
                name: name.as_str().to_owned(),
            });
        }
        parsed.insert(name, value);
    }
    Ok(parsed)
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let invalid = || CourierError::InvalidHeader {
        name: name.to_owned(),
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((header_name, header_value))
}

/// Maps a completed round trip onto the uniform result shape.
fn classify<T: DeserializeOwned>(response: HttpResponse) -> Result<CallResponse<T>> {
    let call = CallResult::from_response(&response);
    let status = call.status_code;

    if (200..400).contains(&status) {
        // An empty body decodes like JSON `null`, so `()` and `Option<_>` work.
        let body: &[u8] = if response.body.is_empty() {
            b"null"
        } else {
            &response.body
        };
        return match serde_json::from_slice::<T>(body) {
            Ok(body) => Ok(CallResponse { call, body }),
            Err(err) => Err(upstream(UpstreamError {
                status_code: 500,
                code: Some(INTERNAL_ERROR_CODE.to_owned()),
                message: err.to_string(),
                response: call,
            })),
        };
    }

    let err = match serde_json::from_slice::<wire::ErrorPayload>(&response.body) {
        Ok(payload) => UpstreamError {
            status_code: status,
            code: payload.code,
            message: payload.message,
            response: call,
        },
        Err(_) => UpstreamError {
            status_code: status,
            code: None,
            message: format!(
                "unknown error, status code: {status}, response: {}",
                String::from_utf8_lossy(&response.body)
            ),
            response: call,
        },
    };
    Err(upstream(err))
}

fn upstream(err: UpstreamError) -> CourierError {
    CourierError::Upstream(Box::new(err))
}
