//! # Command Surface
//!
//! Raw user input either starts with a recognized prefix command or is a
//! plain chat turn. `/image <prompt>` generates an image, `/askimage
//! <question>` asks about the session's last-uploaded image; everything else
//! goes to the selected provider as normal chat over the session history.

use crate::core::session::Session;
use crate::providers::dispatch::{Dispatcher, NO_SESSION_IMAGE};
use crate::providers::types::{ChatInput, is_warning, warning};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GenerateImage(String),
    AskImage(String),
    Chat(String),
}

/// Case-insensitive prefix strip: `/IMAGE a fox` parses like `/image a fox`.
fn strip_prefix_ci<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    if input.len() >= prefix.len() && input[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&input[prefix.len()..])
    } else {
        None
    }
}

impl Command {
    pub fn parse(input: &str) -> Command {
        let trimmed = input.trim();
        if let Some(rest) = strip_prefix_ci(trimmed, "/askimage") {
            return Command::AskImage(rest.trim().to_string());
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "/image") {
            return Command::GenerateImage(rest.trim().to_string());
        }
        Command::Chat(trimmed.to_string())
    }
}

/// Executes one user turn against the current session and returns the
/// assistant's reply text. The caller owns the session log: it appends the
/// user message before calling this and appends the returned reply after.
pub async fn respond(
    dispatcher: &Dispatcher,
    selector: &str,
    session: &Session,
    input: &str,
) -> String {
    match Command::parse(input) {
        Command::GenerateImage(prompt) if prompt.is_empty() => {
            warning("Please provide an image prompt after /image")
        }
        Command::GenerateImage(prompt) => {
            let result = dispatcher.generate_image(&prompt).await;
            if is_warning(&result) {
                result
            } else {
                format!("Image URL: {result}")
            }
        }
        Command::AskImage(question) => match session.image.as_ref() {
            None => NO_SESSION_IMAGE.to_string(),
            Some(image) => dispatcher.ask_about_image(selector, &question, image).await,
        },
        Command::Chat(_) => {
            dispatcher
                .dispatch(selector, &ChatInput::History(session.messages.clone()), None)
                .await
        }
    }
}
