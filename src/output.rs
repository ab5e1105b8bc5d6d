//! Leveled console output mirrored into the structured log
//!
//! Console lines use the same markers everywhere: `✓` success, `⚠` warning,
//! `✗` error. Each line is also recorded as a `tracing` event so the log file
//! keeps an append-only history of every run.
//!
//! Progress goes to stderr. Stdout carries only command results such as
//! passwords, tokens and listings, so it can be piped.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

const BANNER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Install a tracing subscriber that appends to `log_file`
pub fn init_logging(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))
}

/// Print a section banner
pub fn section(title: &str) {
    eprintln!("{}", BANNER);
    eprintln!("{}", title);
    eprintln!("{}", BANNER);
    eprintln!();
    tracing::info!(section = title, "begin");
}

pub fn info(message: &str) {
    eprintln!("{}", message);
    tracing::info!("{}", message);
}

pub fn success(message: &str) {
    eprintln!("✓ {}", message);
    tracing::info!(outcome = "success", "{}", message);
}

pub fn warning(message: &str) {
    eprintln!("⚠ {}", message);
    tracing::warn!("{}", message);
}

pub fn error(message: &str) {
    eprintln!("✗ {}", message);
    tracing::error!("{}", message);
}
