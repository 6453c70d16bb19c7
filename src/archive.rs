//! Archive fingerprinting and extraction.
//!
//! An export archive is a zip container with a required top-level
//! `conversations.json` entry. A missing entry (or a byte stream that is not
//! a zip at all) invalidates the whole archive before anything is written.

use crate::schema::Conversation;
use eyre::{Context, Result, eyre};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};

/// The single required entry inside an export archive.
pub const CONVERSATIONS_ENTRY: &str = "conversations.json";

/// Content fingerprint of the raw archive bytes. Byte-identical archives
/// always map to the same digest regardless of their file name.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Open the archive and parse its conversation list.
///
/// Any failure here is fatal for the run: the caller must not have written
/// documents or mutated state yet.
pub fn read_conversations(bytes: &[u8]) -> Result<Vec<Conversation>> {
    let mut zip =
        zip::ZipArchive::new(Cursor::new(bytes)).wrap_err("not a valid zip archive")?;
    let mut entry = zip
        .by_name(CONVERSATIONS_ENTRY)
        .map_err(|_| eyre!("archive is missing required entry `{CONVERSATIONS_ENTRY}`"))?;
    let mut raw = String::new();
    entry
        .read_to_string(&mut raw)
        .wrap_err_with(|| format!("reading `{CONVERSATIONS_ENTRY}` from archive"))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("decoding `{CONVERSATIONS_ENTRY}`"))
}
