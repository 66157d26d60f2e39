use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Marker prefix on every user-facing failure string. The UI distinguishes a
/// warning from a valid payload (text, URL, file path) by this prefix alone.
pub const WARNING_PREFIX: &str = "⚠️";

/// Builds a warning string for display in the conversation log.
pub fn warning(msg: impl fmt::Display) -> String {
    format!("{WARNING_PREFIX} {msg}")
}

/// Returns true if `s` is a warning string rather than a valid payload.
pub fn is_warning(s: &str) -> bool {
    s.starts_with(WARNING_PREFIX)
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a conversation. Immutable once appended to a session;
/// ordering within a session is conversation order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Renders messages as `"<role>: <content>"` lines, preserving order.
/// Used both for providers that want a single flattened prompt and for
/// transcript export.
pub fn flatten(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What a chat turn sends to a provider: either a bare string (command-style
/// or transcribed-audio requests) or the full ordered history of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Text(String),
    History(Vec<Message>),
}

impl ChatInput {
    /// Role-tagged message view. A bare string becomes a single user message.
    pub fn as_messages(&self) -> Vec<Message> {
        match self {
            ChatInput::Text(text) => vec![Message::user(text.clone())],
            ChatInput::History(messages) => messages.clone(),
        }
    }

    /// Single flattened prompt view, for providers that take one string.
    pub fn flattened(&self) -> String {
        flatten(&self.as_messages())
    }
}

/// A displayable image, at most one per session. Produced by generation or
/// upload, consumed by visual Q&A.
#[derive(Debug, Clone)]
pub enum ImageReference {
    Path(PathBuf),
    Url(String),
    DataUri(String),
    Bytes(Vec<u8>),
}

impl ImageReference {
    /// Resolves to a value an `image_url` field accepts: a remote URL or a
    /// `data:image/png;base64,...` URI. Raw bytes are persisted to a temp
    /// file first; that file stays on disk (never cleaned up by this layer).
    pub fn to_image_url(&self) -> io::Result<String> {
        match self {
            ImageReference::Url(url) => Ok(url.clone()),
            ImageReference::DataUri(uri) => Ok(uri.clone()),
            _ => Ok(format!("data:image/png;base64,{}", self.to_base64()?)),
        }
    }

    /// Resolves to a raw base64 payload (no data-URI header), for providers
    /// that embed image bytes inline. Remote URLs are not fetched.
    pub fn to_base64(&self) -> io::Result<String> {
        match self {
            ImageReference::Path(path) => Ok(BASE64.encode(std::fs::read(path)?)),
            ImageReference::Bytes(bytes) => {
                let path = persist_temp(bytes, ".png")?;
                Ok(BASE64.encode(std::fs::read(&path)?))
            }
            ImageReference::DataUri(uri) => Ok(uri
                .split_once(',')
                .map(|(_, b64)| b64.to_string())
                .unwrap_or_else(|| uri.clone())),
            ImageReference::Url(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "remote image URLs cannot be embedded inline",
            )),
        }
    }
}

/// Audio handed to transcription: a file on disk or an in-memory buffer.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl AudioSource {
    /// Normalizes to a local file path. Buffers are written to a temp file
    /// that stays on disk (never cleaned up by this layer).
    pub fn to_path(&self) -> io::Result<PathBuf> {
        match self {
            AudioSource::Path(path) => Ok(path.clone()),
            AudioSource::Bytes(bytes) => persist_temp(bytes, ".wav"),
        }
    }
}

/// Writes `bytes` to a named temp file and keeps it past the handle's
/// lifetime, returning the path.
fn persist_temp(bytes: &[u8], suffix: &str) -> io::Result<PathBuf> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(bytes)?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_round_trip() {
        let w = warning("OpenAI unavailable: no key");
        assert!(is_warning(&w));
        assert!(w.contains("unavailable"));
        assert!(!is_warning("Image URL: https://example.com/fox.png"));
    }

    #[test]
    fn test_flatten_preserves_order_and_roles() {
        let messages = vec![
            Message::user("Hello"),
            Message::assistant("Hi there"),
            Message::user("How are you?"),
        ];
        assert_eq!(
            flatten(&messages),
            "user: Hello\nassistant: Hi there\nuser: How are you?"
        );
    }

    #[test]
    fn test_chat_input_text_wraps_as_user_message() {
        let input = ChatInput::Text("Hello".to_string());
        let messages = input.as_messages();
        assert_eq!(messages, vec![Message::user("Hello")]);
        assert_eq!(input.flattened(), "user: Hello");
    }

    #[test]
    fn test_chat_input_history_passes_through() {
        let history = vec![Message::user("a"), Message::assistant("b")];
        let input = ChatInput::History(history.clone());
        assert_eq!(input.as_messages(), history);
    }

    #[test]
    fn test_image_reference_data_uri_strips_header() {
        let encoded = BASE64.encode(b"not really a png");
        let uri = format!("data:image/png;base64,{encoded}");
        let image = ImageReference::DataUri(uri.clone());
        assert_eq!(image.to_base64().unwrap(), encoded);
        assert_eq!(image.to_image_url().unwrap(), uri);
    }

    #[test]
    fn test_image_reference_url_passes_through() {
        let image = ImageReference::Url("https://example.com/fox.png".to_string());
        assert_eq!(
            image.to_image_url().unwrap(),
            "https://example.com/fox.png"
        );
        assert!(image.to_base64().is_err());
    }

    #[test]
    fn test_image_reference_bytes_persist_and_encode() {
        let image = ImageReference::Bytes(b"fake image bytes".to_vec());
        let encoded = image.to_base64().unwrap();
        assert_eq!(BASE64.decode(encoded).unwrap(), b"fake image bytes");
    }

    #[test]
    fn test_audio_bytes_persist_to_path() {
        let audio = AudioSource::Bytes(b"RIFF....WAVE".to_vec());
        let path = audio.to_path().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF....WAVE");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_message_serializes_lowercase_roles() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert!(json.contains(r#""role":"user""#));
        let json = serde_json::to_string(&Message::assistant("yo")).unwrap();
        assert!(json.contains(r#""role":"assistant""#));
    }
}
