//! # chat-archive-sync
//!
//! Imports ChatGPT bulk-export archives (a zip containing `conversations.json`)
//! into a local Markdown vault, one note per conversation.
//!
//! ## Incremental import
//!
//! Each run is idempotent. Archives are fingerprinted (SHA-256) so a
//! byte-identical archive is recognized regardless of its file name.
//! Conversations already in the vault are compared by `update_time`:
//! unchanged ones are skipped, updated ones have only their new messages
//! appended in place, detected through the invisible `<!-- UID: … -->`
//! marker each rendered message carries. Nothing previously written is
//! rewritten or duplicated.
//!
//! ## Usage
//!
//! ```sh
//! # Import an export archive into a vault
//! chat-archive-sync import ~/Downloads/chatgpt-export.zip --vault ~/notes
//!
//! # Show what has been imported so far
//! chat-archive-sync status --vault ~/notes
//!
//! # Forget all import history (notes are left in place)
//! chat-archive-sync reset --vault ~/notes
//! ```
//!
//! Preferences can be persisted in `~/.config/chat-archive-sync/config.toml`.
//!
//! ## Run reports
//!
//! Every import writes a report note under `<archive root>/Reports/` listing
//! created, updated, skipped and failed conversations for that run.

pub mod archive;
pub mod merge;
pub mod naming;
pub mod process;
pub mod renderer;
pub mod report;
pub mod schema;
pub mod state;
pub mod store;
pub mod timefmt;
