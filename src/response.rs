//! Response post-processing.
//!
//! Models are told to return bare commands, but markdown fences, inline
//! backticks, and chatty preambles still slip through. Cleaning is
//! idempotent: running it over already-clean text changes nothing.

/// Strip markdown and preamble noise from a generated response.
pub fn clean_response(raw: &str) -> String {
    let mut command = raw.trim().to_string();

    // Fenced code block, with or without a language tag.
    if command.starts_with("```") {
        if let Some(first_newline) = command.find('\n') {
            command = command[first_newline + 1..].to_string();
        } else {
            command = command.trim_start_matches('`').to_string();
        }
        if let Some(end) = command.rfind("```") {
            command = command[..end].to_string();
        }
    }

    // Inline backticks.
    command = command.trim().trim_matches('`').to_string();

    // Conversational preambles.
    let preambles = [
        "Here's the command:",
        "Here is the command:",
        "The command is:",
        "You can use:",
        "Run:",
        "Execute:",
        "Command:",
    ];
    for preamble in preambles {
        if let Some(stripped) = command.strip_prefix(preamble) {
            command = stripped.to_string();
        }
    }

    command.trim().to_string()
}

/// The final non-empty, trimmed command lines in order, as handed to the
/// history and clipboard collaborators.
pub fn command_lines(cleaned: &str) -> Vec<String> {
    cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
