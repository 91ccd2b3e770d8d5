//! System context gathering for better command generation.
//!
//! Collects information about the user's environment to help the LLM
//! generate more appropriate commands. Every field is gathered
//! independently; a failure in one degrades to a placeholder string instead
//! of aborting the others.

use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_FILES: usize = 20;

/// Developer tools probed against PATH.
const KNOWN_TOOLS: &[&str] = &[
    "git", "docker", "kubectl", "npm", "node", "python3", "pip", "cargo", "go", "make", "curl",
    "wget", "jq", "rg", "fd", "tar", "ssh",
];

/// Snapshot of the caller's environment, consumed once by the prompt builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub os: String,
    pub shell: String,
    pub cwd: String,
    pub username: String,
    pub git_repo: bool,
    pub files: String,
    pub tools: String,
}

/// Gather system context with the default file cap.
pub fn collect(override_cwd: Option<&Path>, override_shell: Option<&str>) -> PromptContext {
    collect_with_limit(override_cwd, override_shell, DEFAULT_MAX_FILES)
}

pub fn collect_with_limit(
    override_cwd: Option<&Path>,
    override_shell: Option<&str>,
    max_files: usize,
) -> PromptContext {
    let cwd_path = override_cwd
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok());
    let cwd = cwd_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    PromptContext {
        os: get_os_info(),
        shell: override_shell
            .map(str::to_string)
            .unwrap_or_else(get_shell),
        cwd,
        username: get_username(),
        git_repo: cwd_path.as_deref().map(is_git_repo).unwrap_or(false),
        files: cwd_path
            .as_deref()
            .map(|p| list_files(p, max_files))
            .unwrap_or_else(|| "Error listing files".to_string()),
        tools: detect_tools(),
    }
}

/// Get OS information from uname, falling back to compile-time constants.
fn get_os_info() -> String {
    #[cfg(unix)]
    {
        use std::process::Command;
        if let Ok(output) = Command::new("uname").arg("-sr").output() {
            if output.status.success() {
                let info = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !info.is_empty() {
                    return info;
                }
            }
        }
    }

    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Get the user's shell name from $SHELL.
fn get_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .and_then(|path| {
            Path::new(&path)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

fn get_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Unknown".to_string())
}

/// A `.git` entry is enough; full repository validation is not worth a
/// subprocess here.
fn is_git_repo(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// List up to `max_files` entry names, comma-joined, with an explicit
/// truncation marker when entries were dropped.
fn list_files(dir: &Path, max_files: usize) -> String {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return "Error listing files".to_string(),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    if names.is_empty() {
        return "(empty)".to_string();
    }

    let truncated = names.len() > max_files;
    names.truncate(max_files);
    let mut joined = names.join(", ");
    if truncated {
        joined.push_str(", ...");
    }
    joined
}

/// Probe the fixed tool list against PATH.
fn detect_tools() -> String {
    let path_var = match std::env::var("PATH") {
        Ok(v) => v,
        Err(_) => return "none detected".to_string(),
    };
    let dirs: Vec<&str> = path_var.split(':').filter(|d| !d.is_empty()).collect();

    let found: Vec<&str> = KNOWN_TOOLS
        .iter()
        .filter(|tool| dirs.iter().any(|dir| Path::new(dir).join(tool).exists()))
        .copied()
        .collect();

    if found.is_empty() {
        "none detected".to_string()
    } else {
        found.join(", ")
    }
}
