use chat_archive_sync::process::{self, RunOptions};
use chat_archive_sync::state::SyncState;
use chat_archive_sync::store::FsStore;
use chat_archive_sync::{archive, timefmt};
use clap::{Parser, Subcommand};
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Import ChatGPT conversation export archives into a Markdown vault.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vault directory receiving the notes.
    /// Defaults to ./chat-archive if not set in config.
    #[arg(long, value_name = "DIR", global = true)]
    vault: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/chat-archive-sync/config.toml
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Print each note created, updated or skipped.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress standard output (progress bars).
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Import an export archive (.zip with conversations.json).
    Import {
        /// Path to the export archive.
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Re-process a previously imported archive without asking.
        #[arg(short, long)]
        yes: bool,
    },
    /// Show how many archives and conversations have been imported.
    Status,
    /// Forget all import history. Existing notes are left in place.
    Reset,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    vault: Option<PathBuf>,
    archive_folder: Option<String>,
    date_prefix: Option<bool>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("chat-archive-sync/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_cfg = load_file_config(cli.config.as_deref())?;

    // Resolve vault (CLI > Config > Default)
    let vault = cli
        .vault
        .or(file_cfg.vault)
        .unwrap_or_else(|| PathBuf::from("chat-archive"));

    let opts = RunOptions {
        archive_root: file_cfg.archive_folder.unwrap_or_else(|| "ChatGPT".into()),
        date_prefix: file_cfg.date_prefix.unwrap_or(true),
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Import { archive, yes } => import(&vault, &archive, yes, &opts),
        Command::Status => status(&vault),
        Command::Reset => reset(&vault),
    }
}

fn import(vault: &Path, archive_path: &Path, yes: bool, opts: &RunOptions) -> Result<()> {
    let bytes = fs::read(archive_path)
        .wrap_err_with(|| format!("Failed to read archive: {}", archive_path.display()))?;
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive_path.display().to_string());

    fs::create_dir_all(vault)
        .wrap_err_with(|| format!("Failed to create vault: {}", vault.display()))?;
    let mut state = SyncState::load(vault)?;

    // Dedup gate: a known archive needs an explicit go-ahead. Re-processing
    // is always safe; a partial earlier run may have left conversations
    // behind.
    let digest = archive::fingerprint(&bytes);
    if let Some(record) = state.archive(&digest)
        && !yes
        && !confirm_reprocess(&record.file_name, record.processed_at)?
    {
        eprintln!("Import cancelled.");
        return Ok(());
    }

    let mut store = FsStore::new(vault);
    let outcome = process::run(&mut store, &mut state, &bytes, &file_name, opts)
        .wrap_err("Archive could not be processed")?;
    state.save(vault)?;

    let s = outcome.summary;
    if outcome.had_errors {
        let report = outcome
            .report_path
            .map(|p| format!(" See {p}."))
            .unwrap_or_default();
        eprintln!(
            "Completed with {} error(s). {} created, {} updated, {} skipped.{}",
            s.failed + s.global_errors,
            s.created,
            s.updated,
            s.skipped,
            report
        );
    } else if !opts.quiet {
        eprintln!(
            "Done. {} created, {} updated, {} skipped.",
            s.created, s.updated, s.skipped
        );
    }
    Ok(())
}

fn confirm_reprocess(file_name: &str, processed_at: chrono::DateTime<chrono::Utc>) -> Result<bool> {
    eprint!(
        "This archive was already imported on {} (as \"{}\"). Process again? [y/N] ",
        processed_at.format("%Y-%m-%d %H:%M:%S"),
        file_name
    );
    io::stderr().flush().ok();
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .wrap_err("Failed to read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn status(vault: &Path) -> Result<()> {
    let state = SyncState::load(vault)?;
    println!(
        "{} archive(s) imported, {} conversation(s) tracked.",
        state.archives.len(),
        state.conversations.len()
    );
    for (digest, record) in &state.archives {
        println!(
            "  {}  {}  ({})",
            &digest[..12.min(digest.len())],
            record.file_name,
            timefmt::human(record.processed_at.timestamp() as f64)
        );
    }
    Ok(())
}

fn reset(vault: &Path) -> Result<()> {
    if SyncState::clear(vault)? {
        eprintln!("Import history cleared. Notes were left in place.");
    } else {
        eprintln!("No import history to clear.");
    }
    Ok(())
}
