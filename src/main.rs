//! askcmd - ask your terminal for the command you need.
//!
//! Turns a natural language request into a shell command by calling the
//! configured LLM backend, grounded in the caller's live environment (OS,
//! shell, working directory, files, installed tools, git status).

mod clipboard;
mod config;
mod context;
mod error;
mod history;
mod prompt;
mod provider;
mod response;
mod ui;

use clap::Parser;
use colored::Colorize;
use config::Overrides;
use error::GenError;
use provider::Provider;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const EXIT_INTERRUPT: i32 = 130;
const HISTORY_DISPLAY_LIMIT: usize = 10;
const TYPEWRITER_DELAY_MS: u64 = 12;

#[derive(Parser)]
#[command(name = "askcmd")]
#[command(version, about = "Ask your terminal for the command you need")]
#[command(long_about = "Turns a natural language request into a shell command, \
grounded in your OS, shell, working directory, and installed tools.")]
struct Cli {
    /// The natural language request
    #[arg(value_name = "QUESTION")]
    question: Vec<String>,

    /// Backend to use (gemini, openai, azure-openai, claude, vertex-claude)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model override for the chosen backend (deployment name for Azure)
    #[arg(short, long)]
    model: Option<String>,

    /// Vertex region override (vertex-claude only)
    #[arg(short, long)]
    region: Option<String>,

    /// Path to the JSON settings file
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Print only the command, no decorations
    #[arg(short, long)]
    silent: bool,

    /// Print the command with a typewriter effect
    #[arg(short, long)]
    typewriter: bool,

    /// Print the resolved backend, masked credential, and request details
    #[arg(short, long)]
    verbose: bool,

    /// Show recent history and exit
    #[arg(long)]
    history: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("askcmd=warn".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // An interrupt exits immediately; no in-flight call cleanup is attempted.
    let code = tokio::select! {
        code = run(cli) => code,
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            EXIT_INTERRUPT
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    if cli.history {
        return match history::show(HISTORY_DISPLAY_LIMIT) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                1
            }
        };
    }

    let question = cli.question.join(" ").trim().to_string();
    if question.is_empty() {
        eprintln!(
            "{} No question provided. Try: askcmd \"find files larger than 100MB\"",
            "Error:".red().bold()
        );
        return 1;
    }

    match generate(&cli, &question).await {
        Ok(command) => {
            present(&cli, &question, &command);
            0
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            1
        }
    }
}

/// Resolve config, build and validate the provider, gather context, render
/// the prompt, call the backend, and clean the result.
async fn generate(cli: &Cli, question: &str) -> error::Result<String> {
    let overrides = Overrides {
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        region: cli.region.clone(),
        settings_path: cli.settings.clone(),
    };
    let config = config::resolve(&overrides)?;
    let provider = Provider::create(&config);
    if cli.verbose {
        eprintln!(
            "{}",
            format!("[askcmd] resolved provider: {}", provider.name()).dimmed()
        );
    }
    provider.validate_config()?;

    let context = context::collect(None, None);
    let rendered = prompt::build(&context, question);
    if cli.verbose {
        eprintln!("{}", "[askcmd] rendered prompt:".dimmed());
        eprint!("{}", rendered);
    }

    let raw = provider.generate(&rendered, cli.silent, cli.verbose).await?;
    let cleaned = response::clean_response(&raw);
    if response::command_lines(&cleaned).is_empty() {
        return Err(GenError::ContentEmpty(
            "nothing remained after cleaning the response".to_string(),
        ));
    }
    Ok(cleaned)
}

/// Hand the result to the display, clipboard, and history collaborators.
/// Clipboard and history failures are warnings only.
fn present(cli: &Cli, question: &str, command: &str) {
    let lines = response::command_lines(command);

    if cli.silent {
        println!("{}", command);
    } else {
        ui::print_banner();
        if cli.typewriter {
            ui::typewriter(command, TYPEWRITER_DELAY_MS);
        } else {
            println!("{}", command.green().bold());
        }
        match clipboard::copy(command) {
            Ok(()) => eprintln!("{}", "(copied to clipboard)".dimmed()),
            Err(e) => warn!("Clipboard copy failed: {}", e),
        }
    }

    if let Err(e) = history::append(question, &lines) {
        warn!("Failed to record history: {}", e);
    }
}
