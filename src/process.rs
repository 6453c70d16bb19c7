//! The synchronization run: change detection and the sequential
//! create/merge loop over one archive.
//!
//! One conversation fully completes (success or failure) before the next
//! begins; a failed conversation is recorded and the run continues. Persisted
//! state is mutated in memory here and flushed by the caller once the run
//! returns, so a single failed conversation keeps its old record and is
//! retried on the next import.

use crate::archive;
use crate::merge;
use crate::naming;
use crate::renderer;
use crate::report::{RunLog, RunSummary};
use crate::schema::Conversation;
use crate::state::{ConversationRecord, SyncState};
use crate::store::DocumentStore;
use chrono::Utc;
use eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::Cell;
use std::collections::HashSet;

/// The only skip reason this engine produces.
pub const SKIP_NO_UPDATES: &str = "No Updates";
/// Sub-folder of the archive root that receives run reports.
pub const REPORTS_FOLDER: &str = "Reports";

pub struct RunOptions {
    /// Vault-relative root folder for conversation notes.
    pub archive_root: String,
    /// Prefix file names with the conversation's creation date.
    pub date_prefix: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            archive_root: "ChatGPT".to_string(),
            date_prefix: true,
            verbose: false,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unseen,
    Unchanged,
    Updated,
}

/// Pure decision, no side effects. Ties count as unchanged so that
/// re-importing an unmodified archive is a no-op.
pub fn classify(
    conversation: &Conversation,
    record: Option<&ConversationRecord>,
) -> Classification {
    match record {
        None => Classification::Unseen,
        Some(rec) if rec.update_time >= conversation.update_time => Classification::Unchanged,
        Some(_) => Classification::Updated,
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Vault-relative path of the written report, when the write succeeded.
    pub report_path: Option<String>,
    pub had_errors: bool,
}

enum Outcome {
    Created { path: String },
    Updated { path: String, added: usize },
    Skipped,
}

/// Synchronize one archive against the store.
///
/// Returns `Err` only for an invalid archive (missing or undecodable
/// `conversations.json`), before anything is written; every later failure is
/// absorbed into the run log. The caller is responsible for persisting
/// `state` after a successful return.
pub fn run<S: DocumentStore>(
    store: &mut S,
    state: &mut SyncState,
    bytes: &[u8],
    file_name: &str,
    opts: &RunOptions,
) -> Result<RunOutcome> {
    let conversations = archive::read_conversations(bytes)?;
    let digest = archive::fingerprint(bytes);

    let pruned = state.prune_missing(&*store);
    if opts.verbose && pruned > 0 {
        eprintln!("Pruned {pruned} record(s) whose notes were deleted.");
    }

    let mut log = RunLog::new(file_name);

    let pb = if opts.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(conversations.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .unwrap()
            .progress_chars("=>-"),
        );
        bar.println(format!("Found {} conversations.", conversations.len()));
        bar
    };

    match store.create_folder(&opts.archive_root) {
        Ok(()) => {
            for conv in &conversations {
                let title = conv.display_title().to_string();
                match sync_conversation(store, state, conv, opts) {
                    Ok(Outcome::Created { path }) => {
                        state.upsert_conversation(&conv.id, path.clone(), conv.update_time);
                        log.record_created(&title, &path);
                        if opts.verbose {
                            pb.println(format!("Created:  {path}"));
                        }
                    }
                    Ok(Outcome::Updated { path, added }) => {
                        state.upsert_conversation(&conv.id, path.clone(), conv.update_time);
                        log.record_updated(&title, &path, added);
                        if opts.verbose {
                            pb.println(format!("Updated:  {path} (+{added})"));
                        }
                    }
                    Ok(Outcome::Skipped) => {
                        log.record_skipped(&title, SKIP_NO_UPDATES);
                        if opts.verbose {
                            pb.println(format!("Skipped:  {title}"));
                        }
                    }
                    Err(e) => {
                        log.record_failed(&title, &format!("{e:#}"));
                        pb.println(format!("Error [{title}]: {e:#}"));
                    }
                }
                pb.inc(1);
            }
        }
        Err(e) => {
            log.record_global_error(format!("cannot create archive root: {e:#}"));
        }
    }
    pb.finish_and_clear();

    state.record_archive(digest, file_name);

    let report_path = match write_report(store, &log, opts) {
        Ok(path) => Some(path),
        Err(e) => {
            log.record_global_error(format!("failed to write report: {e:#}"));
            None
        }
    };

    Ok(RunOutcome {
        summary: log.summary(),
        report_path,
        had_errors: log.has_errors(),
    })
}

fn sync_conversation<S: DocumentStore>(
    store: &mut S,
    state: &SyncState,
    conv: &Conversation,
    opts: &RunOptions,
) -> Result<Outcome> {
    let record = state.conversation(&conv.id);
    match classify(conv, record) {
        Classification::Unchanged => Ok(Outcome::Skipped),
        Classification::Unseen => {
            let folder = naming::folder_for(conv, &opts.archive_root);
            store.create_folder(&folder)?;
            let existing: HashSet<String> = store.list_folder(&folder).into_iter().collect();
            let name =
                naming::disambiguate(&naming::base_file_name(conv, opts.date_prefix), &existing);
            let path = format!("{folder}/{name}");
            let text = renderer::render_note(conv)?;
            store.create(&path, &text)?;
            Ok(Outcome::Created { path })
        }
        Classification::Updated => {
            let Some(record) = record else {
                return Err(eyre!("updated conversation has no record"));
            };
            let path = record.path.clone();
            if !store.exists(&path) {
                return Err(eyre!("note `{path}` no longer exists"));
            }
            let added = Cell::new(0usize);
            store.modify(&path, &|text| {
                let out = merge::merge(text, conv)?;
                added.set(out.appended);
                Ok(out.text)
            })?;
            Ok(Outcome::Updated {
                path,
                added: added.get(),
            })
        }
    }
}

fn write_report<S: DocumentStore>(
    store: &mut S,
    log: &RunLog,
    opts: &RunOptions,
) -> Result<String> {
    let folder = format!("{}/{}", opts.archive_root, REPORTS_FOLDER);
    store.create_folder(&folder)?;
    let existing: HashSet<String> = store.list_folder(&folder).into_iter().collect();
    let base = format!("Import Report {}.md", Utc::now().format("%Y-%m-%d"));
    let name = naming::disambiguate(&base, &existing);
    let path = format!("{folder}/{name}");
    store.create(&path, &log.render())?;
    Ok(path)
}
