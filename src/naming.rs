//! Folder placement and collision-free file naming for new notes.

use crate::schema::Conversation;
use crate::timefmt;
use std::collections::HashSet;

const MAX_TITLE_LEN: usize = 120;
const FALLBACK_TITLE: &str = "Untitled";

/// Strip characters that are invalid in file names on common filesystems,
/// collapse whitespace, and bound the length.
pub fn sanitize_title(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let mut collapsed = String::with_capacity(cleaned.len());
    for word in cleaned.split_whitespace() {
        if !collapsed.is_empty() {
            collapsed.push(' ');
        }
        collapsed.push_str(word);
    }
    let mut title: String = collapsed.chars().take(MAX_TITLE_LEN).collect();
    while title.ends_with('.') || title.ends_with(' ') {
        title.pop();
    }
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// Vault-relative folder for a conversation: the archive root plus a
/// year-month bucket from its creation time (UTC).
pub fn folder_for(conversation: &Conversation, archive_root: &str) -> String {
    format!("{}/{}", archive_root, timefmt::month(conversation.create_time))
}

/// Base file name before collision handling, e.g. `20240512 - Title.md`.
pub fn base_file_name(conversation: &Conversation, date_prefix: bool) -> String {
    let title = sanitize_title(conversation.display_title());
    if date_prefix {
        format!(
            "{} - {}.md",
            timefmt::compact_day(conversation.create_time),
            title
        )
    } else {
        format!("{title}.md")
    }
}

/// Pick the first free name: `name.md`, then `name (1).md`, `name (2).md`, …
/// with the smallest unused suffix. Deterministic for a given existing set.
pub fn disambiguate(base: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(base) {
        return base.to_string();
    }
    let stem = base.strip_suffix(".md").unwrap_or(base);
    for n in 1.. {
        let candidate = format!("{stem} ({n}).md");
        if !existing.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("suffix search is unbounded")
}
