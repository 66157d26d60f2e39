pub mod adapters;
pub mod dispatch;
pub mod extract;
pub mod provider;
pub mod types;

pub use adapters::{GeminiAdapter, GroqAdapter, OpenAiAdapter};
pub use dispatch::{Dispatcher, MODEL_NOT_AVAILABLE, NO_SESSION_IMAGE, Selector};
pub use provider::{ChatProvider, ProviderError};
pub use types::{
    AudioSource, ChatInput, ImageReference, Message, Role, WARNING_PREFIX, flatten, is_warning,
    warning,
};
