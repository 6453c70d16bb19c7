//! Deserialization types for the `conversations.json` entry of a ChatGPT
//! bulk export, and the classification of raw message nodes into renderable
//! chat messages.
//!
//! The export stores messages as a graph: `mapping` is an object keyed by
//! message id whose nodes may or may not carry a `message` payload. Insertion
//! order of `mapping` is the conversation's native traversal order and must
//! be preserved exactly, so it deserializes into an `IndexMap`.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// One conversation object from the export's top-level array.
#[derive(Debug, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub create_time: f64,
    #[serde(default)]
    pub update_time: f64,
    #[serde(default)]
    pub mapping: IndexMap<String, MappingNode>,
}

/// A node in the `mapping` graph. Root and tombstone nodes carry no message.
#[derive(Debug, Default, Deserialize)]
pub struct MappingNode {
    #[serde(default)]
    pub message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Option<Vec<Value>>,
}

/// Display role of a renderable message. The export carries more roles
/// (system, tool); those classify as [`MessageKind::Hidden`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A message that passed validation and will be rendered.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub create_time: Option<f64>,
    /// Non-empty text segments, in part order.
    pub segments: Vec<String>,
}

/// Exhaustive classification of a raw mapping node.
#[derive(Debug)]
pub enum MessageKind {
    /// Valid content: has a user/assistant role and at least one non-empty
    /// text segment.
    Chat(ChatMessage),
    /// Authored by system or tool roles; never rendered, never counted.
    Hidden,
    /// No payload, no role, or no renderable text.
    Empty,
}

/// Classify a raw node. Invalid nodes are excluded from rendering and from
/// merge-delta counts but never abort processing.
pub fn classify_node(node: &MappingNode) -> MessageKind {
    let Some(msg) = node.message.as_ref() else {
        return MessageKind::Empty;
    };
    let role = match msg.author.as_ref().map(|a| a.role.as_str()) {
        None | Some("") => return MessageKind::Empty,
        Some("user") => Role::User,
        Some("assistant") => Role::Assistant,
        Some(_) => return MessageKind::Hidden,
    };
    let segments: Vec<String> = msg
        .content
        .as_ref()
        .and_then(|c| c.parts.as_ref())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.as_str())
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if segments.is_empty() {
        return MessageKind::Empty;
    }
    MessageKind::Chat(ChatMessage {
        id: msg.id.clone(),
        role,
        create_time: msg.create_time,
        segments,
    })
}

impl Conversation {
    /// All valid messages, in the mapping's insertion order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.mapping
            .values()
            .filter_map(|node| match classify_node(node) {
                MessageKind::Chat(m) => Some(m),
                MessageKind::Hidden | MessageKind::Empty => None,
            })
            .collect()
    }

    /// Display title, falling back when the export left it blank.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => "Untitled",
        }
    }
}
