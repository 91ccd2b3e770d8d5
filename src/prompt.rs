//! Prompt rendering.
//!
//! One fixed five-section template; a pure function of (context, question).
//! The rendered text is built once per invocation and reused byte-identically
//! across retries.

use crate::context::PromptContext;

/// Render the full prompt sent to the backend.
pub fn build(context: &PromptContext, question: &str) -> String {
    format!(
        "SYSTEM:\n\
         You are an expert terminal assistant. You translate natural language requests into shell commands for the user's environment.\n\
         \n\
         CONTEXT:\n\
         OS: {os}\n\
         Shell: {shell}\n\
         Working directory: {cwd}\n\
         User: {username}\n\
         Git repository: {git}\n\
         Files here: {files}\n\
         Available tools: {tools}\n\
         \n\
         RULES:\n\
         1. Reply with ONLY the shell command(s), nothing else.\n\
         2. No explanations, no markdown fences, no backticks.\n\
         3. Prefer a single one-line command; chain with && when several steps are needed.\n\
         4. Target the OS and shell named in CONTEXT.\n\
         5. Prefer paths relative to the working directory.\n\
         6. If the request cannot be done safely in a command, reply with an echo stating why in one short sentence.\n\
         \n\
         REQUEST:\n\
         {question}\n\
         \n\
         RESPONSE:\n",
        os = context.os,
        shell = context.shell,
        cwd = context.cwd,
        username = context.username,
        git = if context.git_repo { "yes" } else { "no" },
        files = context.files,
        tools = context.tools,
        question = question,
    )
}
