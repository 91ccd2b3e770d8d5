//! Append-only history of generated commands.
//!
//! One JSON line per successful call: timestamp, the original question, and
//! the generated command lines in order. Failures here are warnings at the
//! call site, never fatal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub commands: Vec<String>,
}

/// Default history location under the user data dir.
pub fn default_history_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join("askcmd").join("history.jsonl"))
        .context("Could not determine data directory")
}

/// Append one record for a successful call.
pub fn append(question: &str, commands: &[String]) -> Result<()> {
    append_to(&default_history_path()?, question, commands)
}

fn append_to(path: &Path, question: &str, commands: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create history directory: {}", parent.display()))?;
    }
    let entry = HistoryEntry {
        timestamp: Utc::now(),
        question: question.to_string(),
        commands: commands.to_vec(),
    };
    let mut line = serde_json::to_string(&entry)?;
    line.push('\n');

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open history file: {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to write history file: {}", path.display()))?;
    Ok(())
}

/// Print the most recent entries.
pub fn show(limit: usize) -> Result<()> {
    show_from(&default_history_path()?, limit)
}

fn show_from(path: &Path, limit: usize) -> Result<()> {
    let entries = load(path)?;
    if entries.is_empty() {
        println!("No history yet.");
        return Ok(());
    }

    let start = entries.len().saturating_sub(limit);
    for entry in &entries[start..] {
        println!(
            "{} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            entry.question
        );
        for command in &entry.commands {
            println!("  {}", command.green());
        }
    }
    Ok(())
}

/// Load all entries, skipping lines that no longer parse.
fn load(path: &Path) -> Result<Vec<HistoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;
    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
