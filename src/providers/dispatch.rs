//! Routes a request to the adapter matching a provider selector and converts
//! every adapter failure into a warning string. Nothing here returns an
//! error: a conversation UI would rather render an apologetic assistant turn
//! than crash, so availability of *a* response wins over strictness.

use log::info;

use super::adapters::{GeminiAdapter, GroqAdapter, OpenAiAdapter};
use super::provider::{ChatProvider, ProviderError};
use super::types::{AudioSource, ChatInput, ImageReference, warning};

/// Returned for a selector naming no known provider. A normal outcome, not
/// an error.
pub const MODEL_NOT_AVAILABLE: &str = "Model not available.";

/// Returned by the command surface when `/askimage` runs in a session with
/// no attached image.
pub const NO_SESSION_IMAGE: &str = "⚠️ No image found for this session. Upload an image first.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    OpenAi,
    Gemini,
    Groq,
}

impl Selector {
    /// Case-insensitive selector lookup. `None` means no such provider.
    pub fn parse(s: &str) -> Option<Selector> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Selector::OpenAi),
            "gemini" => Some(Selector::Gemini),
            "groq" => Some(Selector::Groq),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Selector::OpenAi => "OpenAI",
            Selector::Gemini => "Gemini",
            Selector::Groq => "Groq",
        }
    }
}

/// Converts an adapter failure into the user-facing warning string.
/// Credential failures use the "unavailable" template so the UI can tell a
/// misconfigured provider from a failing one.
fn fail(label: &str, op: &str, err: ProviderError) -> String {
    match err {
        ProviderError::Credential(msg) => warning(format!("{label} unavailable: {msg}")),
        err => warning(format!("{op}: {err}")),
    }
}

/// Multimodal turns take question text, not history; a history input is
/// flattened into one.
fn question_text(input: &ChatInput) -> String {
    match input {
        ChatInput::Text(text) => text.clone(),
        ChatInput::History(_) => input.flattened(),
    }
}

/// Holds one adapter per provider and routes requests among them. Stateless
/// apart from the adapters' HTTP clients; every method is a pure function of
/// its inputs and always returns a string.
pub struct Dispatcher {
    openai: OpenAiAdapter,
    gemini: GeminiAdapter,
    groq: GroqAdapter,
}

impl Dispatcher {
    pub fn new(openai: OpenAiAdapter, gemini: GeminiAdapter, groq: GroqAdapter) -> Self {
        Self {
            openai,
            gemini,
            groq,
        }
    }

    /// Routes a chat turn. With an image present, providers that support
    /// multimodal input get the multimodal variant; Groq ignores the image
    /// and always takes its text path. An unknown selector yields the fixed
    /// "not available" string.
    pub async fn dispatch(
        &self,
        selector: &str,
        input: &ChatInput,
        image: Option<&ImageReference>,
    ) -> String {
        let Some(selector) = Selector::parse(selector) else {
            info!("dispatch refused unknown selector: {selector}");
            return MODEL_NOT_AVAILABLE.to_string();
        };

        match (selector, image) {
            (Selector::OpenAi, Some(image)) => self
                .openai
                .ask_about_image(&question_text(input), image)
                .await
                .unwrap_or_else(|e| fail("OpenAI", "Multi-modal response error", e)),
            (Selector::OpenAi, None) => self
                .openai
                .chat(input)
                .await
                .unwrap_or_else(|e| fail("OpenAI", "OpenAI error", e)),
            (Selector::Gemini, Some(image)) => self
                .gemini
                .ask_about_image(&question_text(input), image)
                .await
                .unwrap_or_else(|e| fail("Gemini", "Gemini multimodal error", e)),
            (Selector::Gemini, None) => self
                .gemini
                .chat(input)
                .await
                .unwrap_or_else(|e| fail("Gemini", "Gemini error", e)),
            (Selector::Groq, _) => self
                .groq
                .chat(input)
                .await
                .unwrap_or_else(|e| fail("Groq", "Groq error", e)),
        }
    }

    /// Generates an image and returns a displayable reference (URL or data
    /// URI), or a warning string.
    pub async fn generate_image(&self, prompt: &str) -> String {
        self.openai
            .generate_image(prompt)
            .await
            .unwrap_or_else(|e| fail("OpenAI", "Image generation error", e))
    }

    /// Visual Q&A through the selected provider's multimodal path.
    pub async fn ask_about_image(
        &self,
        selector: &str,
        question: &str,
        image: &ImageReference,
    ) -> String {
        self.dispatch(selector, &ChatInput::Text(question.to_string()), Some(image))
            .await
    }

    /// Speech-to-text, or a warning string.
    pub async fn transcribe(&self, audio: &AudioSource) -> String {
        self.openai
            .transcribe(audio)
            .await
            .unwrap_or_else(|e| fail("OpenAI", "Transcription error", e))
    }

    /// Text-to-speech. Returns the written audio file's path, a
    /// `tts_url:`-prefixed playback URL, or a warning string.
    pub async fn speak(
        &self,
        text: &str,
        voice: Option<&str>,
        instructions: Option<&str>,
    ) -> String {
        match self.openai.speak(text, voice, instructions).await {
            Ok(result) => result,
            Err(ProviderError::Parse(msg)) => warning(msg),
            Err(e) => fail("OpenAI", "TTS error", e),
        }
    }
}
