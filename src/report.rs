//! Per-run outcome log and the rendered import report.
//!
//! The log lives only for the duration of one run; it is rendered into a
//! report note under the `Reports` folder and then dropped. Empty categories
//! are omitted from the report, and the table of contents links only to the
//! sections that are present.

use chrono::{DateTime, Utc};
use std::fmt::Write;

#[derive(Debug)]
pub struct Entry {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub global_errors: usize,
}

#[derive(Debug)]
pub struct RunLog {
    archive_name: String,
    started_at: DateTime<Utc>,
    created: Vec<Entry>,
    updated: Vec<Entry>,
    skipped: Vec<Entry>,
    failed: Vec<Entry>,
    global_errors: Vec<String>,
}

impl RunLog {
    pub fn new(archive_name: &str) -> Self {
        Self {
            archive_name: archive_name.to_string(),
            started_at: Utc::now(),
            created: Vec::new(),
            updated: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            global_errors: Vec::new(),
        }
    }

    pub fn record_created(&mut self, title: &str, path: &str) {
        self.created.push(Entry {
            title: title.to_string(),
            detail: path.to_string(),
        });
    }

    pub fn record_updated(&mut self, title: &str, path: &str, added: usize) {
        self.updated.push(Entry {
            title: title.to_string(),
            detail: format!("{path}: {added} message(s) added"),
        });
    }

    pub fn record_skipped(&mut self, title: &str, reason: &str) {
        self.skipped.push(Entry {
            title: title.to_string(),
            detail: reason.to_string(),
        });
    }

    pub fn record_failed(&mut self, title: &str, error: &str) {
        self.failed.push(Entry {
            title: title.to_string(),
            detail: error.to_string(),
        });
    }

    pub fn record_global_error(&mut self, message: String) {
        self.global_errors.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.failed.is_empty() || !self.global_errors.is_empty()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            created: self.created.len(),
            updated: self.updated.len(),
            skipped: self.skipped.len(),
            failed: self.failed.len(),
            global_errors: self.global_errors.len(),
        }
    }

    /// Render the report note.
    pub fn render(&self) -> String {
        let s = self.summary();
        let mut out = String::new();
        out.push_str("# Import Report\n\n");
        let _ = writeln!(out, "Archive: {}", self.archive_name);
        let _ = writeln!(
            out,
            "Imported: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(
            out,
            "\n{} created, {} updated, {} skipped, {} failed.",
            s.created, s.updated, s.skipped, s.failed
        );

        let sections: Vec<(&str, &[Entry], &str)> = vec![
            ("Created Notes", &self.created, "Path"),
            ("Updated Notes", &self.updated, "Path"),
            ("Skipped Notes", &self.skipped, "Reason"),
            ("Failed Notes", &self.failed, "Error"),
        ];

        let mut toc = String::new();
        for (name, entries, _) in &sections {
            if !entries.is_empty() {
                let _ = writeln!(toc, "- [{}](#{})", name, anchor(name));
            }
        }
        if !self.global_errors.is_empty() {
            let _ = writeln!(toc, "- [Global Errors](#{})", anchor("Global Errors"));
        }
        if !toc.is_empty() {
            out.push_str("\n## Contents\n\n");
            out.push_str(&toc);
        }

        for (name, entries, column) in &sections {
            if entries.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {name}\n");
            let _ = writeln!(out, "| Title | {column} |");
            out.push_str("|---|---|\n");
            for entry in *entries {
                let _ = writeln!(out, "| {} | {} |", cell(&entry.title), cell(&entry.detail));
            }
        }

        if !self.global_errors.is_empty() {
            out.push_str("\n## Global Errors\n\n");
            for err in &self.global_errors {
                let _ = writeln!(out, "- {err}");
            }
        }
        out
    }
}

fn anchor(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_match_recorded_entries() {
        let mut log = RunLog::new("export.zip");
        log.record_created("A", "ChatGPT/2024-05/A.md");
        log.record_updated("B", "ChatGPT/2024-05/B.md", 2);
        log.record_skipped("C", "No Updates");
        assert_eq!(
            log.summary(),
            RunSummary {
                created: 1,
                updated: 1,
                skipped: 1,
                failed: 0,
                global_errors: 0
            }
        );
        assert!(!log.has_errors());
    }

    #[test]
    fn empty_sections_are_omitted() {
        let mut log = RunLog::new("export.zip");
        log.record_created("Only One", "path.md");
        let text = log.render();
        assert!(text.contains("## Created Notes"));
        assert!(!text.contains("## Updated Notes"));
        assert!(!text.contains("## Skipped Notes"));
        assert!(!text.contains("## Failed Notes"));
        assert!(!text.contains("## Global Errors"));
    }

    #[test]
    fn toc_links_only_present_sections() {
        let mut log = RunLog::new("export.zip");
        log.record_skipped("C", "No Updates");
        log.record_global_error("store unavailable".into());
        let text = log.render();
        assert!(text.contains("- [Skipped Notes](#skipped-notes)"));
        assert!(text.contains("- [Global Errors](#global-errors)"));
        assert!(!text.contains("- [Created Notes]"));
        assert!(log.has_errors());
    }

    #[test]
    fn updated_entries_carry_message_counts() {
        let mut log = RunLog::new("export.zip");
        log.record_updated("B", "B.md", 1);
        assert!(log.render().contains("B.md: 1 message(s) added"));
    }

    #[test]
    fn table_cells_are_escaped() {
        let mut log = RunLog::new("export.zip");
        log.record_failed("bad|title", "line\nbreak");
        let text = log.render();
        assert!(text.contains("bad\\|title"));
        assert!(text.contains("line break"));
    }
}
