use std::fmt;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use super::types::ChatInput;

/// Errors that can occur during adapter operations. None of these escape the
/// dispatch boundary; they are converted into warning strings there.
#[derive(Debug)]
pub enum ProviderError {
    /// Credential missing or unusable. No network call is attempted.
    Credential(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// Provider returned a non-success HTTP status.
    Api { status: u16, message: String },
    /// Response arrived but carried nothing usable.
    Parse(String),
    /// Local file I/O failed (uploads, temp files, audio output).
    Io(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Credential(msg) => write!(f, "{msg}"),
            ProviderError::Network(msg) => write!(f, "network error: {msg}"),
            ProviderError::Api { status, message } => {
                write!(f, "status {status} - {message}")
            }
            ProviderError::Parse(msg) => write!(f, "{msg}"),
            ProviderError::Io(msg) => write!(f, "file error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        ProviderError::Io(e.to_string())
    }
}

/// The text-chat surface every provider implements. Multimodal, image
/// generation, and audio operations are provider-specific and live on the
/// concrete adapters.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the name of the provider.
    fn name(&self) -> &str;

    /// Completes one chat turn and returns the answer text. An `Err` means
    /// no usable text could be produced, including after any fallback call.
    async fn chat(&self, input: &ChatInput) -> Result<String, ProviderError>;
}

/// Posts a JSON body and returns the raw JSON response. Non-success statuses
/// become `ProviderError::Api` carrying the body text.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    auth: Option<(&str, String)>,
    body: &impl Serialize,
) -> Result<Value, ProviderError> {
    debug!("POST {url}");

    let mut request = client.post(url).json(body);
    if let Some((header, value)) = auth {
        request = request.header(header, value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    debug!("{url} responded {status}");

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        warn!("API error from {url}: {status} - {message}");
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))
}
