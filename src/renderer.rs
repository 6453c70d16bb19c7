//! Deterministic serialization of a conversation into Markdown note text.
//!
//! The leading YAML frontmatter (`conversation_id`, `create_time`,
//! `update_time`) and the body's `Created:` / `Last Updated:` lines, the
//! per-message `<!-- UID: … -->` markers, and their exact label text are a
//! wire contract: the merge engine relocates and rewrites them by label, so
//! changing any of these strings breaks incremental sync for existing vaults.

use crate::schema::{ChatMessage, Conversation, Role};
use crate::timefmt;
use eyre::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

pub const USER_LABEL: &str = "User";
pub const ASSISTANT_LABEL: &str = "ChatGPT";

pub const UID_OPEN: &str = "<!-- UID: ";
pub const UID_CLOSE: &str = " -->";

pub const LAST_UPDATED_LABEL: &str = "Last Updated:";
pub const UPDATE_TIME_KEY: &str = "update_time";

#[derive(Serialize)]
struct Frontmatter<'a> {
    aliases: &'a str,
    conversation_id: &'a str,
    create_time: f64,
    update_time: f64,
}

/// Render a complete note: frontmatter, preamble, every valid message.
pub fn render_note(conversation: &Conversation) -> Result<String> {
    let fm = Frontmatter {
        aliases: conversation.display_title(),
        conversation_id: &conversation.id,
        create_time: conversation.create_time,
        update_time: conversation.update_time,
    };
    let yaml = serde_yaml::to_string(&fm).wrap_err("encoding note frontmatter")?;

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&yaml);
    out.push_str("---\n\n");
    let _ = writeln!(out, "# {}\n", conversation.display_title());
    let _ = writeln!(out, "Created: {}", timefmt::human(conversation.create_time));
    let _ = writeln!(
        out,
        "{} {}",
        LAST_UPDATED_LABEL,
        timefmt::human(conversation.update_time)
    );
    out.push('\n');
    out.push_str(&render_messages(&conversation.messages()));
    Ok(out)
}

/// Render a sequence of message blocks. Shared between the full render and
/// the incremental merge path.
pub fn render_messages(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for msg in messages {
        out.push_str(&render_message(msg));
    }
    out
}

fn render_message(msg: &ChatMessage) -> String {
    // User and assistant blocks differ in heading depth and quote depth so
    // they stay visually distinguishable in a rendered vault.
    let (heading, label, quote) = match msg.role {
        Role::User => ("####", USER_LABEL, ">"),
        Role::Assistant => ("######", ASSISTANT_LABEL, ">>"),
    };

    let mut out = String::new();
    match msg.create_time {
        Some(ts) => {
            let _ = writeln!(out, "{heading} {label}, on {};", timefmt::human(ts));
        }
        None => {
            let _ = writeln!(out, "{heading} {label};");
        }
    }
    out.push('\n');
    for (i, segment) in msg.segments.iter().enumerate() {
        if i > 0 {
            out.push_str(quote);
            out.push('\n');
        }
        for line in segment.lines() {
            if line.is_empty() {
                out.push_str(quote);
            } else {
                let _ = write!(out, "{quote} {line}");
            }
            out.push('\n');
        }
    }
    out.push('\n');
    let _ = writeln!(out, "{}{}{}", UID_OPEN, msg.id, UID_CLOSE);
    if msg.role == Role::Assistant {
        out.push_str("\n---\n");
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::extract_uids;
    use crate::schema::Conversation;

    fn sample() -> Conversation {
        serde_json::from_str(
            r#"{
                "id": "conv-1", "title": "Sample Chat",
                "create_time": 1715522591.0, "update_time": 1715530000.0,
                "mapping": {
                    "root": {},
                    "m1": {"message": {"id": "m1", "author": {"role": "user"},
                        "create_time": 1715522591.0,
                        "content": {"parts": ["Hello\nthere"]}}},
                    "m2": {"message": {"id": "m2", "author": {"role": "assistant"},
                        "create_time": 1715522600.0,
                        "content": {"parts": ["Hi!", "Second part"]}}}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn note_carries_wire_format_fields() {
        let text = render_note(&sample()).unwrap();
        assert!(text.starts_with("---\n"));
        assert!(text.contains("conversation_id: conv-1"));
        assert!(text.contains("update_time: 1715530000.0"));
        assert!(text.contains("Created: 2024-05-12 14:03:11"));
        assert!(text.contains("Last Updated: 2024-05-12 16:06:40"));
        assert!(text.contains("# Sample Chat"));
    }

    #[test]
    fn roles_render_distinguishably() {
        let text = render_note(&sample()).unwrap();
        assert!(text.contains("#### User, on 2024-05-12 14:03:11;"));
        assert!(text.contains("###### ChatGPT, on 2024-05-12 14:03:20;"));
        assert!(text.contains("> Hello\n> there"));
        assert!(text.contains(">> Hi!"));
        // Assistant blocks end with a separator after the marker
        assert!(text.contains("<!-- UID: m2 -->\n\n---\n"));
    }

    #[test]
    fn markers_round_trip_in_traversal_order() {
        let conv = sample();
        let text = render_note(&conv).unwrap();
        let expected: Vec<String> = conv.messages().into_iter().map(|m| m.id).collect();
        assert_eq!(extract_uids(&text), expected);
    }

    #[test]
    fn multi_segment_messages_are_separated_by_a_quote_line() {
        let text = render_note(&sample()).unwrap();
        assert!(text.contains(">> Hi!\n>>\n>> Second part"));
    }
}
