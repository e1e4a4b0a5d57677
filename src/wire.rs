use serde::Deserialize;

/// Structured error body returned by upstream services.
#[derive(Debug, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
