//! The document-store seam between the sync engine and the vault on disk.
//!
//! The engine only ever talks to [`DocumentStore`]; paths are vault-relative
//! with `/` separators, like `ChatGPT/2024-05/20240512 - Title.md`.

use eyre::{Context, Result, eyre};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub trait DocumentStore {
    fn read(&self, path: &str) -> Result<String>;

    /// Create a new document. Fails if a document already exists at `path`;
    /// collision-free naming is the caller's job.
    fn create(&mut self, path: &str, text: &str) -> Result<()>;

    /// Replace a document's text with `transform(current)`. The new text is
    /// committed as a whole or not at all.
    fn modify(&mut self, path: &str, transform: &dyn Fn(&str) -> Result<String>) -> Result<()>;

    fn exists(&self, path: &str) -> bool;

    /// Vault-relative paths of every Markdown document in the store.
    fn list_all(&self) -> Vec<String>;

    /// File names (not paths) of the documents directly under `folder`.
    fn list_folder(&self, folder: &str) -> Vec<String>;

    /// Idempotent: an already-existing folder is not an error.
    fn create_folder(&mut self, path: &str) -> Result<()>;
}

/// Filesystem-backed store rooted at the vault directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut abs = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            abs.push(part);
        }
        abs
    }
}

impl DocumentStore for FsStore {
    fn read(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.resolve(path)).wrap_err_with(|| format!("reading `{path}`"))
    }

    fn create(&mut self, path: &str, text: &str) -> Result<()> {
        let abs = self.resolve(path);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&abs)
            .wrap_err_with(|| format!("creating `{path}`"))?;
        file.write_all(text.as_bytes())
            .wrap_err_with(|| format!("writing `{path}`"))
    }

    fn modify(&mut self, path: &str, transform: &dyn Fn(&str) -> Result<String>) -> Result<()> {
        let abs = self.resolve(path);
        let current =
            fs::read_to_string(&abs).wrap_err_with(|| format!("reading `{path}` for modify"))?;
        let next = transform(&current)?;
        fs::write(&abs, next).wrap_err_with(|| format!("rewriting `{path}`"))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn list_all(&self) -> Vec<String> {
        let mut found = Vec::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::from([self.root.clone()]);
        while let Some(dir) = queue.pop_front() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    queue.push_back(path);
                } else if path.extension().is_some_and(|e| e == "md")
                    && let Some(rel) = relative_slash_path(&self.root, &path)
                {
                    found.push(rel);
                }
            }
        }
        found.sort();
        found
    }

    fn list_folder(&self, folder: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.resolve(folder)) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn create_folder(&mut self, path: &str) -> Result<()> {
        let abs = self.resolve(path);
        if abs.is_file() {
            return Err(eyre!("`{path}` exists and is not a folder"));
        }
        fs::create_dir_all(&abs).wrap_err_with(|| format!("creating folder `{path}`"))
    }
}

fn relative_slash_path(root: &Path, abs: &Path) -> Option<String> {
    let rel = abs.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn create_read_modify_roundtrip() {
        let (_dir, mut store) = temp_store();
        store.create_folder("a/b").unwrap();
        store.create("a/b/note.md", "hello").unwrap();
        assert!(store.exists("a/b/note.md"));
        assert_eq!(store.read("a/b/note.md").unwrap(), "hello");

        store
            .modify("a/b/note.md", &|t| Ok(format!("{t} world")))
            .unwrap();
        assert_eq!(store.read("a/b/note.md").unwrap(), "hello world");
    }

    #[test]
    fn create_refuses_to_clobber() {
        let (_dir, mut store) = temp_store();
        store.create("note.md", "one").unwrap();
        assert!(store.create("note.md", "two").is_err());
        assert_eq!(store.read("note.md").unwrap(), "one");
    }

    #[test]
    fn failed_transform_leaves_document_untouched() {
        let (_dir, mut store) = temp_store();
        store.create("note.md", "original").unwrap();
        let err = store.modify("note.md", &|_| Err(eyre!("nope")));
        assert!(err.is_err());
        assert_eq!(store.read("note.md").unwrap(), "original");
    }

    #[test]
    fn create_folder_is_idempotent() {
        let (_dir, mut store) = temp_store();
        store.create_folder("x/y").unwrap();
        store.create_folder("x/y").unwrap();
    }

    #[test]
    fn listing_walks_subfolders() {
        let (_dir, mut store) = temp_store();
        store.create_folder("ChatGPT/2024-05").unwrap();
        store.create("ChatGPT/2024-05/a.md", "").unwrap();
        store.create("ChatGPT/2024-05/b.md", "").unwrap();
        store.create("top.md", "").unwrap();

        assert_eq!(
            store.list_all(),
            vec![
                "ChatGPT/2024-05/a.md".to_string(),
                "ChatGPT/2024-05/b.md".to_string(),
                "top.md".to_string(),
            ]
        );
        let mut names = store.list_folder("ChatGPT/2024-05");
        names.sort();
        assert_eq!(names, vec!["a.md", "b.md"]);
        assert!(store.list_folder("missing").is_empty());
    }
}
