//! Conversion pipeline: open archive, resolve reading order, strip each resource, accumulate.

use crate::archive::{Archive, ArchiveError};
use crate::model::{Chapter, Extraction, SkippedResource};
use crate::package::{resolve_content, DescriptorError};
use crate::strip::Stripper;
use std::io::{Read, Seek};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Fatal conversion errors. Nothing should be written to the output when one occurs.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("failed to open EPUB file")]
    OpenArchive(#[source] ArchiveError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Render `err` and each of its sources on one line, joined by `": "`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut line = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        line.push_str(": ");
        line.push_str(&cause.to_string());
        source = cause.source();
    }
    line
}

/// Options for a conversion run: progress and warning callbacks, break table.
#[derive(Default)]
pub struct ConvertOptions<'a> {
    /// Called with (processed, total) after each resolved resource.
    pub progress: Option<&'a dyn Fn(u32, u32)>,
    /// Called once for every resource that could not be read.
    pub on_warning: Option<&'a dyn Fn(&SkippedResource)>,
    pub stripper: Stripper,
}

/// Convert the EPUB at `path` to plain text with default options.
pub fn convert(path: &Path) -> Result<String, ConvertError> {
    extract(path, &ConvertOptions::default()).map(|e| e.to_text())
}

/// Open the EPUB at `path` and extract every spine resource. The archive is closed
/// before this returns, on success and on failure.
pub fn extract(path: &Path, options: &ConvertOptions<'_>) -> Result<Extraction, ConvertError> {
    let mut archive = Archive::open(path).map_err(ConvertError::OpenArchive)?;
    let mut extraction = extract_from_archive(&mut archive, options)?;
    extraction.source = path.display().to_string();
    Ok(extraction)
}

/// Extract from an already opened archive. Unreadable resources are reported through
/// `options.on_warning` and skipped; resources that strip to nothing are dropped.
pub fn extract_from_archive<R: Read + Seek>(
    archive: &mut Archive<R>,
    options: &ConvertOptions<'_>,
) -> Result<Extraction, ConvertError> {
    let content = resolve_content(archive)?;
    let total = content.files.len() as u32;
    let mut extraction = Extraction::default();

    for (i, path) in content.files.iter().enumerate() {
        let index = i as u32 + 1;
        match archive.read_text(path) {
            Ok(markup) => {
                let text = options.stripper.strip(&markup);
                debug!(path = %path, bytes = markup.len(), chars = text.len(), "stripped resource");
                if !text.is_empty() {
                    extraction.chapters.push(Chapter {
                        index,
                        path: path.clone(),
                        text,
                    });
                }
            }
            Err(e) => {
                let skipped = SkippedResource {
                    path: path.clone(),
                    reason: error_chain(&e),
                };
                if let Some(warn) = options.on_warning {
                    warn(&skipped);
                }
                extraction.skipped.push(skipped);
            }
        }
        if let Some(progress) = options.progress {
            progress(index, total);
        }
    }

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{archive_of, zip_bytes, zip_bytes_with_declared_size};
    use std::io::Cursor;
    use crate::package::{MarkupError, CONTAINER_PATH};
    use std::cell::RefCell;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;

    const PACKAGE: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <manifest>
    <item id="title" href="title.xhtml" media-type="application/xhtml+xml"/>
    <item id="body" href="Text/body.xhtml" media-type="application/xhtml+xml"/>
    <item id="gone" href="gone.xhtml" media-type="application/xhtml+xml"/>
    <item id="blank" href="blank.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="title"/>
    <itemref idref="gone"/>
    <itemref idref="nowhere"/>
    <itemref idref="blank"/>
    <itemref idref="body"/>
  </spine>
</package>"#;

    fn book() -> Vec<(&'static str, &'static str)> {
        vec![
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", PACKAGE),
            ("OEBPS/title.xhtml", "<html><body><h1>Title</h1></body></html>"),
            ("OEBPS/Text/body.xhtml", "<html><body><p>Body text.</p></body></html>"),
            ("OEBPS/blank.xhtml", "<html><body><img src=\"x.png\"/></body></html>"),
        ]
    }

    #[test]
    fn two_resources_end_to_end() {
        let package = r#"<package><manifest>
            <item id="a" href="a.xhtml"/><item id="b" href="b.xhtml"/>
        </manifest><spine><itemref idref="a"/><itemref idref="b"/></spine></package>"#;
        let mut archive = archive_of(&[
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", package),
            ("OEBPS/a.xhtml", "<h1>Title</h1>"),
            ("OEBPS/b.xhtml", "<p>Body text.</p>"),
        ]);
        let extraction = extract_from_archive(&mut archive, &ConvertOptions::default()).unwrap();
        assert_eq!(extraction.to_text(), "Title\n\nBody text.\n\n");
    }

    #[test]
    fn missing_resource_warns_once_and_continues() {
        let warnings = RefCell::new(Vec::new());
        let on_warning = |s: &SkippedResource| warnings.borrow_mut().push(s.path.clone());
        let options = ConvertOptions {
            on_warning: Some(&on_warning),
            ..Default::default()
        };
        let mut archive = archive_of(&book());
        let extraction = extract_from_archive(&mut archive, &options).unwrap();

        assert_eq!(*warnings.borrow(), vec!["OEBPS/gone.xhtml"]);
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.to_text(), "Title\n\nBody text.\n\n");
    }

    #[test]
    fn empty_resources_add_no_separator() {
        let mut archive = archive_of(&book());
        let extraction = extract_from_archive(&mut archive, &ConvertOptions::default()).unwrap();
        let paths: Vec<&str> = extraction.chapters.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["OEBPS/title.xhtml", "OEBPS/Text/body.xhtml"]);
        let indices: Vec<u32> = extraction.chapters.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 4]);
    }

    #[test]
    fn progress_reports_every_resolved_resource() {
        let calls = RefCell::new(Vec::new());
        let progress = |n: u32, total: u32| calls.borrow_mut().push((n, total));
        let options = ConvertOptions {
            progress: Some(&progress),
            ..Default::default()
        };
        let mut archive = archive_of(&book());
        extract_from_archive(&mut archive, &options).unwrap();
        assert_eq!(*calls.borrow(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn duplicate_spine_refs_read_twice() {
        let package = r#"<package><manifest><item id="a" href="a.xhtml"/></manifest>
            <spine><itemref idref="a"/><itemref idref="a"/></spine></package>"#;
        let mut archive = archive_of(&[
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", package),
            ("OEBPS/a.xhtml", "<p>Again</p>"),
        ]);
        let extraction = extract_from_archive(&mut archive, &ConvertOptions::default()).unwrap();
        assert_eq!(extraction.to_text(), "Again\n\nAgain\n\n");
    }

    #[test]
    fn custom_stripper_is_used() {
        let package = r#"<package><manifest><item id="a" href="a.xhtml"/></manifest>
            <spine><itemref idref="a"/></spine></package>"#;
        let mut archive = archive_of(&[
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", package),
            ("OEBPS/a.xhtml", "<ul><li>one</li><li>two</li></ul>"),
        ]);
        let options = ConvertOptions {
            stripper: Stripper::default().with_line_break("</li>"),
            ..Default::default()
        };
        let extraction = extract_from_archive(&mut archive, &options).unwrap();
        assert_eq!(extraction.to_text(), "one\ntwo\n\n");
    }

    #[test]
    fn missing_container_is_fatal() {
        let mut archive = archive_of(&[("OEBPS/content.opf", PACKAGE)]);
        let result = extract_from_archive(&mut archive, &ConvertOptions::default());
        assert!(matches!(
            result,
            Err(ConvertError::Descriptor(DescriptorError::MalformedContainer {
                source: MarkupError::Missing(_)
            }))
        ));
    }

    #[test]
    fn missing_container_error_chain_has_no_repeats() {
        let mut archive = archive_of(&[("OEBPS/content.opf", PACKAGE)]);
        let err = extract_from_archive(&mut archive, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "failed to parse container.xml");
        assert_eq!(
            error_chain(&err),
            "failed to parse container.xml: file not found: META-INF/container.xml"
        );
    }

    #[test]
    fn oversized_declared_size_does_not_abort() {
        let mut members = book();
        members.push(("OEBPS/gone.xhtml", "<p>Declared huge.</p>"));
        let bytes = zip_bytes_with_declared_size(&members, "OEBPS/gone.xhtml", 1 << 62);
        let mut archive = Archive::new(Cursor::new(bytes)).unwrap();
        let warned = RefCell::new(Vec::new());
        let on_warning = |s: &SkippedResource| warned.borrow_mut().push(s.path.clone());
        let options = ConvertOptions {
            on_warning: Some(&on_warning),
            ..Default::default()
        };

        let extraction = extract_from_archive(&mut archive, &options).unwrap();
        let text = extraction.to_text();
        assert!(text.starts_with("Title\n\n"));
        assert!(text.ends_with("Body text.\n\n"));
        let read = extraction.chapters.iter().any(|c| c.path == "OEBPS/gone.xhtml");
        let skipped = extraction.skipped.iter().any(|s| s.path == "OEBPS/gone.xhtml");
        assert!(read != skipped);
        assert_eq!(*warned.borrow() == vec!["OEBPS/gone.xhtml"], skipped);
    }

    #[test]
    fn convert_file_end_to_end() {
        let path = std::env::temp_dir().join("epub2txt_convert_test.epub");
        std::fs::write(&path, zip_bytes(&book())).unwrap();
        let text = convert(&path);
        let extraction = extract(&path, &ConvertOptions::default());
        std::fs::remove_file(&path).ok();
        assert_eq!(text.unwrap(), "Title\n\nBody text.\n\n");
        assert_eq!(extraction.unwrap().source, path.display().to_string());
    }

    #[test]
    fn convert_rejects_non_archive() {
        let path = std::env::temp_dir().join("epub2txt_not_a_zip.epub");
        std::fs::write(&path, b"plain text, not a zip").unwrap();
        let result = convert(&path);
        std::fs::remove_file(&path).ok();
        match result {
            Err(e @ ConvertError::OpenArchive(_)) => {
                assert!(e.to_string().starts_with("failed to open EPUB file"))
            }
            other => panic!("expected OpenArchive, got {:?}", other),
        }
    }
}
