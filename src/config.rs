//! Optional config file loading. Search order: ./epub2txt.toml, then
//! $XDG_CONFIG_HOME/epub2txt/config.toml (or ~/.config/epub2txt/config.toml).

use crate::strip::Stripper;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output format: "text" or "json".
    pub format: Option<String>,
    /// Suppress the progress bar and the success line.
    pub quiet: Option<bool>,
    /// Closing tags to follow with a newline, in addition to the built-in ones (e.g. "</li>").
    pub line_breaks: Option<Vec<String>>,
    /// Closing tags to follow with a blank line (e.g. "</h5>").
    pub paragraph_breaks: Option<Vec<String>>,
}

impl Config {
    /// Default stripper extended with the configured break rules.
    pub fn stripper(&self) -> Stripper {
        let mut stripper = Stripper::default();
        for tag in self.line_breaks.iter().flatten() {
            stripper = stripper.with_line_break(tag);
        }
        for tag in self.paragraph_breaks.iter().flatten() {
            stripper = stripper.with_paragraph_break(tag);
        }
        stripper
    }
}

fn candidate_paths() -> Result<Vec<PathBuf>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("epub2txt.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("epub2txt").join("config.toml"));
    }
    Ok(paths)
}

/// Search order: (1) ./epub2txt.toml, (2) <config dir>/epub2txt/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    for path in &candidate_paths()? {
        if path.exists() {
            return load_config_from(path).map(Some);
        }
    }
    Ok(None)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
