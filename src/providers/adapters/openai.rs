//! OpenAI adapter: text chat, image generation, visual Q&A, transcription,
//! and speech synthesis.
//!
//! Every operation calls a primary endpoint and, on any failure, retries
//! once against a documented secondary or legacy endpoint of the same
//! service before giving up. Response bodies go through the extractor chains
//! in [`crate::providers::extract`], so an unrecognized shape degrades to a
//! stringified body instead of an error.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::extract::{decode, first_match};
use crate::providers::provider::{ChatProvider, ProviderError, post_json};
use crate::providers::types::{AudioSource, ChatInput, ImageReference, Message};

const CHAT_MODEL: &str = "gpt-4o-mini";
const RESPONSES_MODEL: &str = "gpt-4.1";
const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";
const VISION_MODEL: &str = "gpt-4.1-mini";
const TRANSCRIBE_MODEL: &str = "whisper-1";
const TTS_MODEL: &str = "gpt-4o-mini-tts";

pub const DEFAULT_VOICE: &str = "verse";
pub const DEFAULT_STYLE: &str = "Speak in a neutral tone";

/// Synthesized speech always lands here. Concurrent speak calls clobber each
/// other; see DESIGN.md.
pub const TTS_OUTPUT_FILE: &str = "tts.mp3";

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// Secondary chat endpoint body (Responses API).
#[derive(Serialize, Debug)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [Message],
}

#[derive(Serialize, Debug)]
struct ImageRequest<'a> {
    /// The legacy image endpoint predates model selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Serialize, Debug)]
struct VisionRequest {
    model: &'static str,
    input: Vec<VisionMessage>,
}

#[derive(Serialize, Debug)]
struct VisionMessage {
    role: &'static str,
    content: Vec<VisionPart>,
}

#[derive(Serialize, Debug)]
#[serde(tag = "type")]
enum VisionPart {
    #[serde(rename = "input_text")]
    Text { text: String },
    #[serde(rename = "input_image")]
    Image { image_url: String },
}

#[derive(Serialize, Debug)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    instructions: &'a str,
}

// ============================================================================
// Response Envelopes + Extractor Chains
// ============================================================================

#[derive(Deserialize, Default, Debug)]
struct ChatCompletionEnvelope {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Default, Debug)]
struct ChatChoice {
    #[serde(default)]
    message: Option<AssistantMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

fn choice_message_content(e: &ChatCompletionEnvelope) -> Option<String> {
    e.choices.first()?.message.as_ref()?.content.clone()
}

fn choice_text(e: &ChatCompletionEnvelope) -> Option<String> {
    e.choices.first()?.text.clone()
}

const CHAT_PROBES: &[fn(&ChatCompletionEnvelope) -> Option<String>] =
    &[choice_message_content, choice_text];

#[derive(Deserialize, Default, Debug)]
struct ResponsesEnvelope {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

/// Output items arrive either as bare strings or as blocks with a `content`
/// field. Anything else falls through to stringification.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum OutputItem {
    Text(String),
    Block {
        #[serde(default)]
        content: Option<String>,
    },
    Other(Value),
}

fn output_text(e: &ResponsesEnvelope) -> Option<String> {
    e.output_text.clone()
}

fn output_items(e: &ResponsesEnvelope) -> Option<String> {
    let texts: Vec<String> = e
        .output
        .iter()
        .filter_map(|item| match item {
            OutputItem::Text(text) => Some(text.clone()),
            OutputItem::Block { content } => content.clone(),
            OutputItem::Other(_) => None,
        })
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

const RESPONSES_PROBES: &[fn(&ResponsesEnvelope) -> Option<String>] = &[output_text, output_items];

#[derive(Deserialize, Default, Debug)]
struct ImageEnvelope {
    #[serde(default)]
    data: Vec<ImagePayload>,
}

#[derive(Deserialize, Default, Debug)]
struct ImagePayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

fn image_url(e: &ImageEnvelope) -> Option<String> {
    e.data.first()?.url.clone()
}

fn image_data_uri(e: &ImageEnvelope) -> Option<String> {
    let b64 = e.data.first()?.b64_json.as_ref()?;
    Some(format!("data:image/png;base64,{b64}"))
}

const IMAGE_PROBES: &[fn(&ImageEnvelope) -> Option<String>] = &[image_url, image_data_uri];

#[derive(Deserialize, Default, Debug)]
struct TranscriptionEnvelope {
    #[serde(default)]
    text: Option<String>,
}

fn transcription_text(e: &TranscriptionEnvelope) -> Option<String> {
    e.text.clone()
}

const TRANSCRIPTION_PROBES: &[fn(&TranscriptionEnvelope) -> Option<String>] = &[transcription_text];

#[derive(Deserialize, Default, Debug)]
struct SpeechEnvelope {
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Adapter
// ============================================================================

pub struct OpenAiAdapter {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Creates a new OpenAI adapter.
    ///
    /// # Arguments
    /// * `api_key` - API key, if configured (None means every call returns a
    ///   credential error without touching the network)
    /// * `base_url` - Optional custom base URL (defaults to the public API)
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Credential("OPENAI_API_KEY not set.".to_string()))
    }

    fn bearer(&self, key: &str) -> Option<(&'static str, String)> {
        Some(("Authorization", format!("Bearer {key}")))
    }

    /// Generates one square image for `prompt` and returns a displayable
    /// reference: the provider's URL, or a data URI wrapping base64 PNG
    /// bytes. Falls back to the legacy image endpoint on primary failure.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ProviderError> {
        let key = self.key()?;
        info!("openai image generation: {} chars of prompt", prompt.len());

        let primary = ImageRequest {
            model: Some(IMAGE_MODEL),
            prompt,
            n: 1,
            size: IMAGE_SIZE,
        };
        let raw = match post_json(
            &self.client,
            &format!("{}/images/generations", self.base_url),
            self.bearer(key),
            &primary,
        )
        .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!("image generation failed ({err}), retrying legacy endpoint");
                let legacy = ImageRequest {
                    model: None,
                    prompt,
                    n: 1,
                    size: IMAGE_SIZE,
                };
                post_json(
                    &self.client,
                    &format!("{}/images", self.base_url),
                    self.bearer(key),
                    &legacy,
                )
                .await?
            }
        };

        let envelope: ImageEnvelope = decode(&raw);
        Ok(first_match(&envelope, IMAGE_PROBES, &raw))
    }

    /// Answers `question` about `image`. The image is resolved to a data URI
    /// (persisting raw bytes to a temp file on the way) and paired with the
    /// question in a multimodal payload. If the multimodal call fails, the
    /// question is retried without the image so the turn still gets an
    /// answer, just not one grounded in the picture.
    pub async fn ask_about_image(
        &self,
        question: &str,
        image: &ImageReference,
    ) -> Result<String, ProviderError> {
        let key = self.key()?;
        let image_url = image.to_image_url()?;

        let full = VisionRequest {
            model: VISION_MODEL,
            input: vec![VisionMessage {
                role: "user",
                content: vec![
                    VisionPart::Text {
                        text: question.to_string(),
                    },
                    VisionPart::Image { image_url },
                ],
            }],
        };

        let url = format!("{}/responses", self.base_url);
        let raw = match post_json(&self.client, &url, self.bearer(key), &full).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("multimodal call failed ({err}), retrying without the image");
                let text_only = VisionRequest {
                    model: VISION_MODEL,
                    input: vec![VisionMessage {
                        role: "user",
                        content: vec![VisionPart::Text {
                            text: question.to_string(),
                        }],
                    }],
                };
                post_json(&self.client, &url, self.bearer(key), &text_only).await?
            }
        };

        let envelope: ResponsesEnvelope = decode(&raw);
        Ok(first_match(&envelope, RESPONSES_PROBES, &raw))
    }

    /// Transcribes audio to text. The source is normalized to a local file
    /// path first; the upload itself is multipart. One identical retry on
    /// failure.
    pub async fn transcribe(&self, audio: &AudioSource) -> Result<String, ProviderError> {
        let key = self.key()?;
        let path = audio.to_path()?;
        let bytes = std::fs::read(&path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        info!("openai transcription: {} bytes from {file_name}", bytes.len());

        let raw = match self.post_transcription(key, bytes.clone(), &file_name).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("transcription failed ({err}), retrying once");
                self.post_transcription(key, bytes, &file_name).await?
            }
        };

        let envelope: TranscriptionEnvelope = decode(&raw);
        Ok(first_match(&envelope, TRANSCRIPTION_PROBES, &raw))
    }

    async fn post_transcription(
        &self,
        key: &str,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<Value, ProviderError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", TRANSCRIBE_MODEL)
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
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

    /// Synthesizes `text` to speech and returns the path of the written
    /// audio file, or a `tts_url:`-prefixed playback URL when the provider
    /// answers with a URL instead of audio bytes.
    pub async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        instructions: Option<&str>,
    ) -> Result<String, ProviderError> {
        let key = self.key()?;
        let request = SpeechRequest {
            model: TTS_MODEL,
            voice: voice.unwrap_or(DEFAULT_VOICE),
            input: text,
            instructions: instructions.unwrap_or(DEFAULT_STYLE),
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));

        let audio_bytes = if is_json {
            let raw: Value = response
                .json()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;
            let envelope: SpeechEnvelope = decode(&raw);
            match envelope.audio.or(envelope.content) {
                Some(value) => match BASE64.decode(value.as_bytes()) {
                    Ok(bytes) => bytes,
                    // Not base64: the provider handed back a playback URL.
                    Err(_) => return Ok(format!("tts_url:{value}")),
                },
                None => Vec::new(),
            }
        } else {
            response
                .bytes()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?
                .to_vec()
        };

        if audio_bytes.is_empty() {
            return Err(ProviderError::Parse(
                "TTS returned no audio bytes.".to_string(),
            ));
        }

        std::fs::write(TTS_OUTPUT_FILE, &audio_bytes)?;
        Ok(TTS_OUTPUT_FILE.to_string())
    }
}

#[async_trait]
impl ChatProvider for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    /// Chat completion against `/chat/completions`; any failure retries once
    /// against the Responses endpoint with its own extraction chain.
    async fn chat(&self, input: &ChatInput) -> Result<String, ProviderError> {
        let key = self.key()?;
        let messages = input.as_messages();
        info!("openai chat: {} messages", messages.len());

        let primary = ChatCompletionRequest {
            model: CHAT_MODEL,
            messages: &messages,
        };
        match post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            self.bearer(key),
            &primary,
        )
        .await
        {
            Ok(raw) => {
                let envelope: ChatCompletionEnvelope = decode(&raw);
                Ok(first_match(&envelope, CHAT_PROBES, &raw))
            }
            Err(err) => {
                warn!("chat completions failed ({err}), retrying responses endpoint");
                let fallback = ResponsesRequest {
                    model: RESPONSES_MODEL,
                    input: &messages,
                };
                let raw = post_json(
                    &self.client,
                    &format!("{}/responses", self.base_url),
                    self.bearer(key),
                    &fallback,
                )
                .await?;
                let envelope: ResponsesEnvelope = decode(&raw);
                Ok(first_match(&envelope, RESPONSES_PROBES, &raw))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_extraction_message_content_wins_over_text() {
        let raw = json!({
            "choices": [{
                "message": {"content": "from message"},
                "text": "from legacy text"
            }]
        });
        let envelope: ChatCompletionEnvelope = decode(&raw);
        assert_eq!(first_match(&envelope, CHAT_PROBES, &raw), "from message");
    }

    #[test]
    fn test_chat_extraction_falls_back_to_choice_text() {
        let raw = json!({"choices": [{"text": "legacy completion"}]});
        let envelope: ChatCompletionEnvelope = decode(&raw);
        assert_eq!(first_match(&envelope, CHAT_PROBES, &raw), "legacy completion");
    }

    #[test]
    fn test_chat_extraction_stringifies_unknown_shape() {
        let raw = json!({"id": "resp_123", "object": "chat.completion"});
        let envelope: ChatCompletionEnvelope = decode(&raw);
        let text = first_match(&envelope, CHAT_PROBES, &raw);
        assert!(text.contains("resp_123"));
    }

    #[test]
    fn test_responses_extraction_output_text_wins() {
        let raw = json!({
            "output_text": "direct",
            "output": ["item one", {"content": "item two"}]
        });
        let envelope: ResponsesEnvelope = decode(&raw);
        assert_eq!(first_match(&envelope, RESPONSES_PROBES, &raw), "direct");
    }

    #[test]
    fn test_responses_extraction_concatenates_output_items() {
        let raw = json!({"output": ["item one", {"content": "item two"}]});
        let envelope: ResponsesEnvelope = decode(&raw);
        assert_eq!(
            first_match(&envelope, RESPONSES_PROBES, &raw),
            "item one\nitem two"
        );
    }

    #[test]
    fn test_image_extraction_url_wins_over_b64() {
        let raw = json!({
            "data": [{"url": "https://img.example/fox.png", "b64_json": "QUJD"}]
        });
        let envelope: ImageEnvelope = decode(&raw);
        assert_eq!(
            first_match(&envelope, IMAGE_PROBES, &raw),
            "https://img.example/fox.png"
        );
    }

    #[test]
    fn test_image_extraction_wraps_b64_as_data_uri() {
        let raw = json!({"data": [{"b64_json": "QUJD"}]});
        let envelope: ImageEnvelope = decode(&raw);
        assert_eq!(
            first_match(&envelope, IMAGE_PROBES, &raw),
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn test_vision_part_serialization() {
        let part = VisionPart::Image {
            image_url: "data:image/png;base64,QUJD".to_string(),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""type":"input_image""#));
        assert!(json.contains(r#""image_url":"data:image/png;base64,QUJD""#));
    }

    #[test]
    fn test_missing_key_is_credential_error() {
        let adapter = OpenAiAdapter::new(None, None);
        assert!(matches!(adapter.key(), Err(ProviderError::Credential(_))));
        let adapter = OpenAiAdapter::new(Some("  ".to_string()), None);
        assert!(matches!(adapter.key(), Err(ProviderError::Credential(_))));
    }
}
