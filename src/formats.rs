//! Output rendering: plain text (blank-line separated resources) or JSON.

use crate::model::Extraction;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Output format selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Errors from rendering or writing output.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to serialize JSON")]
    Json(#[from] serde_json::Error),

    #[error("cannot write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render the extraction in `format`.
pub fn render(extraction: &Extraction, format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Text => Ok(extraction.to_text()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(extraction)?),
    }
}

/// Render and write to `path`, truncating any existing file. New files get mode 0644 on Unix.
pub fn write_output(
    extraction: &Extraction,
    format: OutputFormat,
    path: &Path,
) -> Result<(), FormatError> {
    let rendered = render(extraction, format)?;
    let io_err = |e| FormatError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    let mut f = options.open(path).map_err(io_err)?;
    f.write_all(rendered.as_bytes()).map_err(io_err)?;
    Ok(())
}
