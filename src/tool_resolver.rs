//! # Tool Path Resolver
//!
//! Trova gli eseguibili esterni (`ffmpeg`, `ffprobe`) usati dall'encoder.
//!
//! ## Ordine di ricerca:
//! 1. Percorso esplicito dalla configurazione
//! 2. Variabile d'ambiente `TOOLS_DIR`
//! 3. Cartella `tools/` accanto all'eseguibile
//! 4. `PATH` di sistema

use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Locates external tools for the current platform
#[derive(Debug, Clone, Default)]
pub struct ToolPathResolver {
    /// Directory with bundled tools, if any
    tools_dir: Option<PathBuf>,
}

impl ToolPathResolver {
    pub fn new() -> Self {
        Self {
            tools_dir: Self::detect_bundled_tools_dir(),
        }
    }

    /// Resolver that only looks in `dir` and the system `PATH`.
    pub fn with_tools_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(dir.into()),
        }
    }

    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        if let Ok(tools_dir) = env::var("TOOLS_DIR") {
            let path = PathBuf::from(tools_dir);
            debug!("Checking TOOLS_DIR environment variable: {:?}", path);
            if path.is_dir() {
                return Some(path);
            }
        }

        let exe_dir = env::current_exe().ok()?.parent()?.to_path_buf();
        let bundled = exe_dir.join("tools");
        debug!("Checking bundled tools directory: {:?}", bundled);
        bundled.is_dir().then_some(bundled)
    }

    /// Resolve a tool, preferring an explicit override.
    pub fn resolve(&self, tool_name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if path.is_file() {
                debug!("Using configured {}: {:?}", tool_name, path);
                return Some(path.to_path_buf());
            }
            warn!("Configured {} not found at {:?}, searching elsewhere", tool_name, path);
        }

        if let Some(dir) = &self.tools_dir {
            let bundled = dir.join(executable_name(tool_name));
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        let found = find_in_system_path(tool_name);
        if found.is_none() {
            warn!("Tool not found: {}", tool_name);
        }
        found
    }

    /// Installation hint shown when a tool is missing.
    pub fn install_instructions(tool_name: &str) -> String {
        let hint = if cfg!(target_os = "linux") {
            "sudo apt-get install ffmpeg"
        } else if cfg!(target_os = "macos") {
            "brew install ffmpeg"
        } else {
            "download a build from https://ffmpeg.org/download.html and add it to PATH"
        };
        format!("'{}' not found. To install: {}", tool_name, hint)
    }
}

fn executable_name(tool_name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool_name)
    } else {
        tool_name.to_string()
    }
}

fn find_in_system_path(tool_name: &str) -> Option<PathBuf> {
    let name = executable_name(tool_name);
    env::split_paths(&env::var_os("PATH")?)
        .map(|dir| dir.join(&name))
        .find(|path| path.is_file())
}
