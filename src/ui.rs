//! Terminal presentation helpers: spinner, banner, typewriter output.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

/// Spinner shown while a provider call is in flight.
///
/// Stopping is idempotent and also happens on drop, so every exit path out of
/// the call engine clears the line exactly once, including unwinds.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    /// Start ticking unless disabled or stderr is not a terminal.
    pub fn start(message: &str, enabled: bool) -> Self {
        if !enabled || !atty::is(atty::Stream::Stderr) {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar: Some(bar) }
    }

    pub fn stop(&self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Short name banner for interactive runs. Written to stderr so stdout stays
/// machine-readable.
pub fn print_banner() {
    eprintln!("{}", "askcmd".cyan().bold());
}

/// Print text character by character, then a trailing newline.
pub fn typewriter(text: &str, delay_ms: u64) {
    let mut out = std::io::stdout();
    for ch in text.chars() {
        print!("{}", ch);
        let _ = out.flush();
        std::thread::sleep(Duration::from_millis(delay_ms));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_inert() {
        let spinner = Spinner::start("working", false);
        spinner.stop();
        // Stop must stay idempotent; drop fires it once more.
        spinner.stop();
    }

    #[test]
    fn test_spinner_drop_after_stop_does_not_panic() {
        let spinner = Spinner::start("working", true);
        spinner.stop();
        drop(spinner);
    }
}
