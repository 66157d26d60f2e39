//! # Conversation Sessions
//!
//! In-memory store mapping session names to ordered message logs. Owned by
//! the UI loop; adapters never touch it. Sessions are transient: nothing is
//! persisted across runs.
//!
//! Invariant: at least one session always exists, so the store refuses to
//! delete the last one.

use std::fmt;

use crate::providers::types::{ImageReference, Message, Role, flatten};

/// One named conversation: an append-only message log plus at most one
/// attached image for visual Q&A (overwritten on each new upload).
#[derive(Debug)]
pub struct Session {
    pub name: String,
    pub messages: Vec<Message>,
    pub image: Option<ImageReference>,
}

impl Session {
    fn new(name: impl Into<String>) -> Self {
        Session {
            name: name.into(),
            messages: Vec::new(),
            image: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Deleting the last remaining session is forbidden.
    LastSession,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::LastSession => write!(f, "cannot delete the last remaining chat"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Ordered collection of sessions with a current one. Creation order is
/// display order.
pub struct SessionStore {
    sessions: Vec<Session>,
    current: usize,
}

impl SessionStore {
    /// Starts with a single empty session named "Chat 1".
    pub fn new() -> Self {
        SessionStore {
            sessions: vec![Session::new("Chat 1")],
            current: 0,
        }
    }

    pub fn current(&self) -> &Session {
        &self.sessions[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Session {
        &mut self.sessions[self.current]
    }

    pub fn names(&self) -> Vec<&str> {
        self.sessions.iter().map(|s| s.name.as_str()).collect()
    }

    /// Creates a fresh session and makes it current. Names count up from the
    /// store size but skip anything already taken, so names stay unique even
    /// after deletions.
    pub fn new_chat(&mut self) -> &str {
        let mut n = self.sessions.len() + 1;
        let mut name = format!("Chat {n}");
        while self.sessions.iter().any(|s| s.name == name) {
            n += 1;
            name = format!("Chat {n}");
        }
        self.sessions.push(Session::new(name));
        self.current = self.sessions.len() - 1;
        &self.sessions[self.current].name
    }

    /// Switches to the named session. Returns false if no such session.
    pub fn switch(&mut self, name: &str) -> bool {
        match self.sessions.iter().position(|s| s.name == name) {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }

    /// Deletes the current session; the first remaining one becomes current.
    pub fn delete_current(&mut self) -> Result<(), SessionError> {
        if self.sessions.len() == 1 {
            return Err(SessionError::LastSession);
        }
        self.sessions.remove(self.current);
        self.current = 0;
        Ok(())
    }

    /// Appends a message to the current session.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.current_mut().messages.push(Message {
            role,
            content: content.into(),
        });
    }

    /// Attaches an image to the current session, replacing any previous one.
    pub fn attach_image(&mut self, image: ImageReference) {
        self.current_mut().image = Some(image);
    }

    /// Renders the current session as plain text, one `"role: content"` line
    /// per message. This is the downloadable transcript.
    pub fn export(&self) -> String {
        flatten(&self.current().messages)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_starts_with_chat_1() {
        let store = SessionStore::new();
        assert_eq!(store.current().name, "Chat 1");
        assert!(store.current().messages.is_empty());
        assert_eq!(store.names(), vec!["Chat 1"]);
    }

    #[test]
    fn test_new_chat_becomes_current() {
        let mut store = SessionStore::new();
        assert_eq!(store.new_chat(), "Chat 2");
        assert_eq!(store.current().name, "Chat 2");
        assert_eq!(store.names(), vec!["Chat 1", "Chat 2"]);
    }

    #[test]
    fn test_delete_last_session_is_refused() {
        let mut store = SessionStore::new();
        assert_eq!(store.delete_current(), Err(SessionError::LastSession));
        assert_eq!(store.names(), vec!["Chat 1"]);
    }

    #[test]
    fn test_delete_falls_back_to_first_session() {
        let mut store = SessionStore::new();
        store.new_chat();
        store.new_chat();
        assert_eq!(store.current().name, "Chat 3");
        store.delete_current().unwrap();
        assert_eq!(store.current().name, "Chat 1");
        assert_eq!(store.names(), vec!["Chat 1", "Chat 2"]);
    }

    #[test]
    fn test_new_chat_names_stay_unique_after_deletion() {
        let mut store = SessionStore::new();
        store.new_chat(); // Chat 2
        store.switch("Chat 1");
        store.delete_current().unwrap(); // only Chat 2 remains
        let name = store.new_chat().to_string();
        assert_ne!(name, "Chat 2");
        let names = store.names();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_switch_to_unknown_session() {
        let mut store = SessionStore::new();
        assert!(!store.switch("Chat 99"));
        assert_eq!(store.current().name, "Chat 1");
    }

    #[test]
    fn test_push_appends_in_order() {
        let mut store = SessionStore::new();
        store.push(Role::User, "Hello");
        store.push(Role::Assistant, "Hi there");
        let messages = &store.current().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "Hi there");
    }

    #[test]
    fn test_attach_image_overwrites_previous() {
        let mut store = SessionStore::new();
        store.attach_image(ImageReference::Url("https://a.example/1.png".to_string()));
        store.attach_image(ImageReference::Url("https://a.example/2.png".to_string()));
        match store.current().image.as_ref().unwrap() {
            ImageReference::Url(url) => assert_eq!(url, "https://a.example/2.png"),
            other => panic!("expected Url, got {other:?}"),
        }
    }

    #[test]
    fn test_export_renders_role_tagged_lines() {
        let mut store = SessionStore::new();
        store.push(Role::User, "Hello");
        store.push(Role::Assistant, "Hi there");
        assert_eq!(store.export(), "user: Hello\nassistant: Hi there");
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut store = SessionStore::new();
        store.push(Role::User, "in chat 1");
        store.new_chat();
        assert!(store.current().messages.is_empty());
        store.switch("Chat 1");
        assert_eq!(store.current().messages.len(), 1);
    }
}
