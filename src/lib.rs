//! epub2txt: extract the plain text of an EPUB in spine reading order.

pub mod archive;
pub mod cli;
pub mod config;
pub mod convert;
pub mod formats;
pub mod model;
pub mod package;
pub mod strip;

// Re-exports for CLI and consumers.
pub use archive::{Archive, ArchiveError};
pub use convert::{
    convert, error_chain, extract, extract_from_archive, ConvertError, ConvertOptions,
};
pub use formats::{render, write_output, FormatError, OutputFormat};
pub use model::{Chapter, Extraction, SkippedResource};
pub use package::{resolve_content, ContentList, DescriptorError, MarkupError};
pub use strip::{strip_markup, BreakRule, Stripper};
