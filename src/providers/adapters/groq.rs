//! Groq adapter: text chat only.
//!
//! The whole conversation is flattened into one user message and sent to the
//! OpenAI-compatible chat completions endpoint. There is no secondary
//! endpoint and no multimodal support; the dispatcher always routes Groq
//! turns through the text path.

use std::time::Duration;

use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};

use crate::providers::provider::{ChatProvider, ProviderError, post_json};
use crate::providers::types::{ChatInput, Message};

const GROQ_MODEL: &str = "mixtral-8x7b-32768";
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Serialize, Debug)]
struct ChatCompletionRequest {
    model: &'static str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Deserialize, Default, Debug)]
struct ChatCompletionEnvelope {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Default, Debug)]
struct ChatChoice {
    #[serde(default)]
    message: Option<AssistantMessage>,
}

#[derive(Deserialize, Default, Debug)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct GroqAdapter {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GroqAdapter {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.groq.com/openai/v1".to_string()),
            client,
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Credential("GROQ_API_KEY not set in environment.".to_string())
            })
    }
}

#[async_trait]
impl ChatProvider for GroqAdapter {
    fn name(&self) -> &str {
        "groq"
    }

    async fn chat(&self, input: &ChatInput) -> Result<String, ProviderError> {
        let key = self.key()?;

        // A bare string goes through untouched; history gets flattened.
        let conversation = match input {
            ChatInput::Text(text) => text.clone(),
            ChatInput::History(_) => input.flattened(),
        };
        info!("groq chat: {} chars of conversation", conversation.len());

        let request = ChatCompletionRequest {
            model: GROQ_MODEL,
            messages: vec![Message::user(conversation)],
            temperature: TEMPERATURE,
        };

        let raw = post_json(
            &self.client,
            &format!("{}/chat/completions", self.base_url),
            Some(("Authorization", format!("Bearer {key}"))),
            &request,
        )
        .await?;

        let envelope: ChatCompletionEnvelope =
            serde_json::from_value(raw).unwrap_or_default();
        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| {
                ProviderError::Parse("response carried no choices[0].message.content".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_matches_wire_shape() {
        let request = ChatCompletionRequest {
            model: GROQ_MODEL,
            messages: vec![Message::user("Hello")],
            temperature: TEMPERATURE,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""model":"mixtral-8x7b-32768""#));
        assert!(json.contains(r#""messages":[{"role":"user","content":"Hello"}]"#));
        assert!(json.contains(r#""temperature":0.7"#));
    }

    #[test]
    fn test_envelope_extraction() {
        let raw = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}]
        });
        let envelope: ChatCompletionEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(
            envelope.choices[0].message.as_ref().unwrap().content.as_deref(),
            Some("Hi there")
        );
    }

    #[test]
    fn test_missing_key_is_credential_error() {
        let adapter = GroqAdapter::new(None, None);
        match adapter.key() {
            Err(ProviderError::Credential(msg)) => {
                assert!(msg.contains("GROQ_API_KEY"));
            }
            other => panic!("expected credential error, got {other:?}"),
        }
    }
}
