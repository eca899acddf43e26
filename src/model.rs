//! Extraction result: per-resource text in reading order plus the resources that were skipped.
//!
//! The text and JSON writers both consume this shape.

use serde::{Deserialize, Serialize};

/// Separator appended after every non-empty resource in the plain-text output.
pub const RESOURCE_SEPARATOR: &str = "\n\n";

/// Everything extracted from one EPUB.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Input archive path as given by the caller.
    pub source: String,
    /// Resources that produced text, in spine order.
    pub chapters: Vec<Chapter>,
    /// Resources that were in the spine but could not be read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedResource>,
}

/// Text of one spine resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// 1-based position in the resolved reading order.
    pub index: u32,
    /// Archive path of the resource.
    pub path: String,
    pub text: String,
}

/// A spine resource that could not be read. Reported as a warning, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedResource {
    pub path: String,
    pub reason: String,
}

impl Extraction {
    /// Concatenate chapter texts, each followed by a blank line.
    pub fn to_text(&self) -> String {
        let capacity = self
            .chapters
            .iter()
            .map(|c| c.text.len() + RESOURCE_SEPARATOR.len())
            .sum();
        let mut out = String::with_capacity(capacity);
        for chapter in &self.chapters {
            out.push_str(&chapter.text);
            out.push_str(RESOURCE_SEPARATOR);
        }
        out
    }
}
