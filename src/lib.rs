//! Confab library exports for testing

use clap::ValueEnum;

pub mod core;
pub mod providers;

#[derive(Clone, Debug, Default, ValueEnum)]
pub enum Provider {
    #[default]
    OpenAi,
    Gemini,
    Groq,
}

impl Provider {
    /// The selector string the dispatcher matches on.
    pub fn selector(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
        }
    }
}
