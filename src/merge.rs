//! Incremental merge of an updated conversation into its existing note.
//!
//! The note's own `<!-- UID: … -->` markers are the record of which messages
//! are already present; anything the user wrote around them is left alone.
//! Appending the delta and rewriting the two update-time fields happens on
//! the full note text, and the caller commits that text as a whole.

use crate::renderer::{self, LAST_UPDATED_LABEL, UID_CLOSE, UID_OPEN, UPDATE_TIME_KEY};
use crate::schema::Conversation;
use crate::timefmt;
use eyre::{Context, Result, eyre};
use std::collections::HashSet;

pub struct MergeOutcome {
    pub text: String,
    /// Number of valid messages appended by this merge.
    pub appended: usize,
}

/// Merge `conversation` into `existing` note text.
///
/// The update-time metadata is rewritten even when there are no new valid
/// messages: a conversation can advance its update time on the strength of
/// invalid or hidden messages alone.
pub fn merge(existing: &str, conversation: &Conversation) -> Result<MergeOutcome> {
    let present: HashSet<String> = extract_uids(existing).into_iter().collect();
    let candidates: Vec<_> = conversation
        .messages()
        .into_iter()
        .filter(|m| !present.contains(&m.id))
        .collect();

    let mut text = rewrite_metadata(existing, conversation)?;
    if !candidates.is_empty() {
        while !text.ends_with("\n\n") {
            text.push('\n');
        }
        text.push_str(&renderer::render_messages(&candidates));
    }
    Ok(MergeOutcome {
        text,
        appended: candidates.len(),
    })
}

/// Collect every message id marker in the text, in document order.
/// Tolerates arbitrary surrounding content.
pub fn extract_uids(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(UID_OPEN) {
        rest = &rest[start + UID_OPEN.len()..];
        let Some(end) = rest.find(UID_CLOSE) else {
            break;
        };
        let id = rest[..end].trim();
        if !id.is_empty() && !id.contains('\n') {
            found.push(id.to_string());
        }
        rest = &rest[end + UID_CLOSE.len()..];
    }
    found
}

/// Rewrite the machine field (`update_time` in the frontmatter) and the
/// human field (`Last Updated:` body line) to the conversation's new update
/// time. The frontmatter is handled structurally so user-added keys survive.
fn rewrite_metadata(text: &str, conversation: &Conversation) -> Result<String> {
    let (yaml, body) = split_frontmatter(text)
        .ok_or_else(|| eyre!("note has no metadata block to update"))?;

    let mut fields: serde_yaml::Mapping =
        serde_yaml::from_str(yaml).wrap_err("decoding note frontmatter")?;
    fields.insert(
        serde_yaml::Value::String(UPDATE_TIME_KEY.to_string()),
        serde_yaml::Value::Number(serde_yaml::Number::from(conversation.update_time)),
    );
    let new_yaml = serde_yaml::to_string(&fields).wrap_err("encoding note frontmatter")?;

    let new_body = rewrite_last_updated(body, conversation.update_time);
    Ok(format!("---\n{new_yaml}---\n{new_body}"))
}

// Rewrite the first `Last Updated:` line if one survives in the body.
fn rewrite_last_updated(body: &str, update_time: f64) -> String {
    let Some(start) = body
        .lines()
        .scan(0usize, |offset, line| {
            let at = *offset;
            *offset += line.len() + 1;
            Some((at, line))
        })
        .find(|(_, line)| line.starts_with(LAST_UPDATED_LABEL))
        .map(|(at, _)| at)
    else {
        return body.to_string();
    };
    let line_end = body[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(body.len());
    format!(
        "{}{} {}{}",
        &body[..start],
        LAST_UPDATED_LABEL,
        timefmt::human(update_time),
        &body[line_end..]
    )
}

fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---\n")?;
    let close = rest.find("\n---\n")?;
    Some((&rest[..close + 1], &rest[close + 5..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::render_note;
    use crate::schema::Conversation;

    fn conversation(update_time: f64, extra_nodes: &str) -> Conversation {
        serde_json::from_str(&format!(
            r#"{{
                "id": "conv-1", "title": "Chat",
                "create_time": 1715522591.0, "update_time": {update_time},
                "mapping": {{
                    "m1": {{"message": {{"id": "m1", "author": {{"role": "user"}},
                        "create_time": 1715522591.0,
                        "content": {{"parts": ["first question"]}}}}}}
                    {extra_nodes}
                }}
            }}"#
        ))
        .unwrap()
    }

    const NEW_MSG: &str = r#", "m2": {"message": {"id": "m2",
        "author": {"role": "assistant"}, "create_time": 1715530000.0,
        "content": {"parts": ["late answer"]}}}"#;

    const EMPTY_MSG: &str = r#", "m3": {"message": {"id": "m3",
        "author": {"role": "user"}, "content": {"parts": [""]}}}"#;

    #[test]
    fn appends_only_missing_messages() {
        let v1 = conversation(1715522591.0, "");
        let note = render_note(&v1).unwrap();

        let v2 = conversation(1715530000.0, NEW_MSG);
        let merged = merge(&note, &v2).unwrap();
        assert_eq!(merged.appended, 1);
        assert_eq!(extract_uids(&merged.text), vec!["m1", "m2"]);
        // Existing block untouched
        assert!(merged.text.contains("> first question"));
        assert!(merged.text.contains(">> late answer"));
    }

    #[test]
    fn merge_is_idempotent() {
        let v2 = conversation(1715530000.0, NEW_MSG);
        let note = render_note(&v2).unwrap();
        let merged = merge(&note, &v2).unwrap();
        assert_eq!(merged.appended, 0);
        assert_eq!(merged.text, note);
    }

    #[test]
    fn metadata_advances_without_new_valid_messages() {
        let v1 = conversation(1715522591.0, "");
        let note = render_note(&v1).unwrap();

        // Only an invalid (empty) message was added, update_time moved anyway
        let v2 = conversation(1715530000.0, EMPTY_MSG);
        let merged = merge(&note, &v2).unwrap();
        assert_eq!(merged.appended, 0);
        assert!(merged.text.contains("update_time: 1715530000.0"));
        assert!(merged.text.contains("Last Updated: 2024-05-12 16:06:40"));
    }

    #[test]
    fn user_content_and_extra_frontmatter_survive() {
        let v1 = conversation(1715522591.0, "");
        let mut note = render_note(&v1).unwrap();
        note = note.replacen("---\n", "---\ntags: imported\n", 1);
        note.push_str("\nMy own appendix notes.\n");

        let v2 = conversation(1715530000.0, NEW_MSG);
        let merged = merge(&note, &v2).unwrap();
        assert!(merged.text.contains("tags: imported"));
        assert!(merged.text.contains("My own appendix notes."));
        assert!(merged.text.contains(">> late answer"));
    }

    #[test]
    fn note_without_metadata_block_fails_cleanly() {
        let v2 = conversation(1715530000.0, "");
        assert!(merge("just some text", &v2).is_err());
    }

    #[test]
    fn extract_uids_tolerates_surrounding_noise() {
        let text = "prose <!-- UID: a --> more\n<!--\u{20}UID: broken\nx -->\n<!-- UID: b -->";
        assert_eq!(extract_uids(text), vec!["a", "b"]);
    }
}
