use serde::{Deserialize, Serialize};

/// Opening line of every new conversation.
pub const GREETING: &str = "Hello! I'm your AI caseworker. How can I help you today?";

/// Chat message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Progress indicator shown while a reply is being prepared.
    Thinking,
}

/// One entry of the visible conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Empty message with a known id, filled in later by a stream.
    pub fn placeholder(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            content: String::new(),
        }
    }
}

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Body of `POST /chat-stream`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<String>,
}

impl ChatRequest {
    pub fn latest(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}

/// User-visible error toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn response_failed() -> Self {
        Self {
            title: "Error".to_string(),
            description: "Failed to get a response. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let message = Message::placeholder("abc", Role::Thinking);
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "thinking");
        assert_eq!(json["content"], "");
    }

    #[test]
    fn chat_request_wire_shape() {
        let request = ChatRequest {
            messages: vec!["hi".to_string(), "hello".to_string()],
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"messages":["hi","hello"]}"#
        );
        assert_eq!(request.latest(), Some("hello"));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }
}
