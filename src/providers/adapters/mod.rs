pub mod gemini;
pub mod groq;
pub mod openai;

pub use gemini::GeminiAdapter;
pub use groq::GroqAdapter;
pub use openai::OpenAiAdapter;
