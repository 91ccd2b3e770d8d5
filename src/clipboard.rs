//! Clipboard handoff for the generated command.
//!
//! Callers treat failure as a warning; a missing display server must never
//! fail the invocation.

use anyhow::{Context, Result};

pub fn copy(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("Failed to open clipboard")?;
    clipboard
        .set_text(text.to_string())
        .context("Failed to write to clipboard")?;
    Ok(())
}
