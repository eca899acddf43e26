//! Read-only access to the EPUB ZIP container. Members are looked up by logical path
//! with `\` and `/` treated as the same separator.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

/// Upper bound on the buffer preallocated from an entry's declared size.
const MAX_PREALLOC: u64 = 1 << 20;

/// Errors from opening the archive or reading one of its members.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a valid ZIP archive")]
    Format(#[source] zip::result::ZipError),

    #[error("file not found: {0}")]
    MemberNotFound(String),

    #[error("cannot read entry {path}")]
    Entry {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("cannot read entry {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// An opened archive. Dropping it releases the underlying reader.
pub struct Archive<R = File> {
    zip: ZipArchive<R>,
    /// Member names in central-directory order.
    names: Vec<String>,
}

impl Archive<File> {
    /// Open the archive at `path`. Fails immediately on a missing, corrupt, or non-ZIP file.
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::new(file)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Wrap any seekable reader holding ZIP data.
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        let zip = ZipArchive::new(reader).map_err(ArchiveError::Format)?;
        let names = zip.file_names().map(String::from).collect();
        Ok(Self { zip, names })
    }

    pub fn member_names(&self) -> &[String] {
        &self.names
    }

    /// Raw bytes of the member whose normalized name equals the normalized `logical_path`.
    pub fn read_member(&mut self, logical_path: &str) -> Result<Vec<u8>, ArchiveError> {
        let wanted = normalize_separators(logical_path);
        let name = self
            .names
            .iter()
            .find(|name| normalize_separators(name) == wanted)
            .cloned()
            .ok_or_else(|| ArchiveError::MemberNotFound(wanted.clone()))?;

        let mut entry = self.zip.by_name(&name).map_err(|e| ArchiveError::Entry {
            path: name.clone(),
            source: e,
        })?;
        let mut buf = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
        entry.read_to_end(&mut buf).map_err(|e| ArchiveError::Io {
            path: name.clone(),
            source: e,
        })?;
        Ok(buf)
    }

    /// Member content decoded as UTF-8 (invalid sequences replaced), leading BOM removed.
    pub fn read_text(&mut self, logical_path: &str) -> Result<String, ArchiveError> {
        let bytes = self.read_member(logical_path)?;
        Ok(String::from_utf8_lossy(strip_bom(&bytes)).into_owned())
    }
}

pub(crate) fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Strip UTF-8 BOM if present.
pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}
