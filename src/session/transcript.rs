//! Conversation transcript
//!
//! Append-only log of what happened during a session, for a chat-style view.
//! The single exception to append-only is the result placeholder for an
//! in-flight command, which is updated in place while polling progresses.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Role of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Result,
    Error,
}

/// Optional metadata attached to an entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// One transcript entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Locally generated identifier
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MessageMeta>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("m{:08x}", rand::random::<u32>()),
            role,
            content: content.into(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            meta: None,
        }
    }

    /// Attach metadata
    pub fn with_meta(mut self, meta: MessageMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Chronological conversation log
///
/// Insertion order is chronological order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user entry, returning its id
    pub fn push_user(&mut self, content: impl Into<String>) -> String {
        self.push(Message::new(Role::User, content))
    }

    /// Append a system entry, returning its id
    pub fn push_system(&mut self, content: impl Into<String>) -> String {
        self.push(Message::new(Role::System, content))
    }

    /// Append a result placeholder that will be updated while polling
    pub fn push_result(&mut self, content: impl Into<String>, meta: MessageMeta) -> String {
        self.push(Message::new(Role::Result, content).with_meta(meta))
    }

    /// Append an error entry, returning its id
    pub fn push_error(&mut self, content: impl Into<String>) -> String {
        self.push(Message::new(Role::Error, content))
    }

    fn push(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Update an entry's content in place; only the result placeholder for an
    /// in-flight command should be the target
    pub fn update(&mut self, id: &str, content: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Update an entry's metadata in place
    pub fn update_meta(&mut self, id: &str, meta: MessageMeta) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.meta = Some(meta);
                true
            }
            None => false,
        }
    }

    /// All entries, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Clear the transcript
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_chronological() {
        let mut transcript = Transcript::new();
        transcript.push_user("go to example.com");
        transcript.push_system("session started");
        transcript.push_error("boom");

        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::System, Role::Error]);
    }

    #[test]
    fn test_result_placeholder_updated_in_place() {
        let mut transcript = Transcript::new();
        transcript.push_user("go to example.com");
        let id = transcript.push_result(
            "Working...",
            MessageMeta {
                command_id: Some("c-1".into()),
                ..Default::default()
            },
        );

        assert!(transcript.update(&id, "Navigated"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().unwrap().content, "Navigated");
        assert_eq!(
            transcript
                .last()
                .unwrap()
                .meta
                .as_ref()
                .unwrap()
                .command_id
                .as_deref(),
            Some("c-1")
        );
    }

    #[test]
    fn test_update_unknown_id() {
        let mut transcript = Transcript::new();
        assert!(!transcript.update("nope", "content"));
    }
}
