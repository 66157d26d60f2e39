//! Gemini adapter: text chat and visual Q&A.
//!
//! Gemini takes a single flattened prompt rather than a role-tagged message
//! array, so history is rendered to `"role: content"` lines first. The
//! primary endpoint is `models/{model}:generateContent`; failures retry once
//! against the legacy `/responses` endpoint.

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::providers::extract::{decode, first_match};
use crate::providers::provider::{ChatProvider, ProviderError, post_json};
use crate::providers::types::{ChatInput, ImageReference};

const GEMINI_MODEL: &str = "gemini-2.5-flash";

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Serialize, Debug)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Debug)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize, Debug)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Legacy endpoint body.
#[derive(Serialize, Debug)]
struct LegacyRequest<'a> {
    model: &'a str,
    input: serde_json::Value,
}

// ============================================================================
// Response Envelopes + Extractor Chains
// ============================================================================

#[derive(Deserialize, Default, Debug)]
struct GenerateContentEnvelope {
    #[serde(default)]
    candidates: Vec<Candidate>,
    /// Some client surfaces flatten the answer to a top-level `text` field.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Default, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default, Debug)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn candidate_text(e: &GenerateContentEnvelope) -> Option<String> {
    let parts = &e.candidates.first()?.content.as_ref()?.parts;
    let texts: Vec<String> = parts.iter().filter_map(|p| p.text.clone()).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

fn top_level_text(e: &GenerateContentEnvelope) -> Option<String> {
    e.text.clone()
}

const GENERATE_PROBES: &[fn(&GenerateContentEnvelope) -> Option<String>] =
    &[candidate_text, top_level_text];

#[derive(Deserialize, Default, Debug)]
struct LegacyEnvelope {
    #[serde(default)]
    output_text: Option<String>,
}

fn legacy_output_text(e: &LegacyEnvelope) -> Option<String> {
    e.output_text.clone()
}

const LEGACY_PROBES: &[fn(&LegacyEnvelope) -> Option<String>] = &[legacy_output_text];

// ============================================================================
// Adapter
// ============================================================================

pub struct GeminiAdapter {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Credential("GEMINI_API_KEY not set.".to_string()))
    }

    fn auth(&self, key: &str) -> Option<(&'static str, String)> {
        Some(("x-goog-api-key", key.to_string()))
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, GEMINI_MODEL)
    }

    async fn generate(&self, key: &str, parts: Vec<Part>) -> Result<String, ProviderError> {
        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
        };

        match post_json(&self.client, &self.generate_url(), self.auth(key), &request).await {
            Ok(raw) => {
                let envelope: GenerateContentEnvelope = decode(&raw);
                Ok(first_match(&envelope, GENERATE_PROBES, &raw))
            }
            Err(err) => {
                warn!("generateContent failed ({err}), retrying legacy endpoint");
                let legacy = LegacyRequest {
                    model: GEMINI_MODEL,
                    input: serde_json::to_value(&request.contents)
                        .unwrap_or(serde_json::Value::Null),
                };
                let raw = post_json(
                    &self.client,
                    &format!("{}/responses", self.base_url),
                    self.auth(key),
                    &legacy,
                )
                .await?;
                let envelope: LegacyEnvelope = decode(&raw);
                Ok(first_match(&envelope, LEGACY_PROBES, &raw))
            }
        }
    }

    /// Answers `question` about `image` by pairing the question text with the
    /// image bytes inline. Failures fall back through the legacy endpoint
    /// inside [`Self::generate`], still carrying the image.
    pub async fn ask_about_image(
        &self,
        question: &str,
        image: &ImageReference,
    ) -> Result<String, ProviderError> {
        let key = self.key()?;
        let data = image.to_base64()?;
        info!("gemini multimodal: question + {} base64 chars", data.len());

        let parts = vec![
            Part::Text {
                text: question.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: "image/png".to_string(),
                    data,
                },
            },
        ];
        self.generate(key, parts).await
    }
}

#[async_trait]
impl ChatProvider for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, input: &ChatInput) -> Result<String, ProviderError> {
        let key = self.key()?;
        let conversation = input.flattened();
        info!("gemini chat: {} chars of flattened prompt", conversation.len());

        self.generate(key, vec![Part::Text { text: conversation }])
            .await
    }
}
