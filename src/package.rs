//! Descriptor resolution: `META-INF/container.xml` -> package document (OPF) -> spine order.
//!
//! The resolver only dereferences ids and paths; it never looks at content documents.

use crate::archive::{strip_bom, Archive, ArchiveError};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use thiserror::Error;
use tracing::debug;

/// Fixed location of the container pointer file.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Why a descriptor document could not be loaded.
#[derive(Debug, Error)]
pub enum MarkupError {
    #[error(transparent)]
    Missing(#[from] ArchiveError),

    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    #[error("invalid attribute")]
    Attribute(#[from] AttrError),

    #[error("{0}")]
    Structure(String),
}

/// Fatal resolution failures. Each aborts the conversion.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to parse container.xml")]
    MalformedContainer {
        #[source]
        source: MarkupError,
    },

    #[error("no rootfile found in container.xml")]
    NoRootFile,

    #[error("failed to parse {path}")]
    MalformedPackage {
        path: String,
        #[source]
        source: MarkupError,
    },
}

/// Parsed `container.xml`: package document paths in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub rootfiles: Vec<String>,
}

/// One manifest entry. `media_type` is kept but not used for filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub href: String,
    pub media_type: String,
}

/// Parsed package document: manifest and spine.
#[derive(Debug, Clone, Default)]
pub struct PackageDescriptor {
    /// Manifest id -> item. A repeated id keeps the last declaration.
    pub manifest: HashMap<String, ManifestItem>,
    /// Spine idrefs in document order, duplicates preserved.
    pub spine: Vec<String>,
}

/// Reading order resolved to archive paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentList {
    /// Full path of the package document inside the archive.
    pub content_path: String,
    /// Directory that manifest hrefs are relative to (`.` for the archive root).
    pub content_dir: String,
    pub files: Vec<String>,
}

/// Read the container and package documents and resolve the spine to archive paths.
pub fn resolve_content<R: Read + Seek>(
    archive: &mut Archive<R>,
) -> Result<ContentList, DescriptorError> {
    let container = archive
        .read_member(CONTAINER_PATH)
        .map_err(MarkupError::from)
        .and_then(|bytes| parse_container(&bytes))
        .map_err(|source| DescriptorError::MalformedContainer { source })?;

    let content_path = container
        .rootfiles
        .into_iter()
        .next()
        .ok_or(DescriptorError::NoRootFile)?;
    let content_dir = parent_dir(&content_path);

    let package = archive
        .read_member(&content_path)
        .map_err(MarkupError::from)
        .and_then(|bytes| parse_package(&bytes))
        .map_err(|source| DescriptorError::MalformedPackage {
            path: content_path.clone(),
            source,
        })?;

    let files = resolve_spine(&package, &content_dir);
    debug!(
        content_path = %content_path,
        resources = files.len(),
        spine = package.spine.len(),
        "resolved reading order"
    );
    Ok(ContentList {
        content_path,
        content_dir,
        files,
    })
}

/// Map each spine idref through the manifest. Idrefs missing from the manifest are skipped.
pub fn resolve_spine(package: &PackageDescriptor, content_dir: &str) -> Vec<String> {
    package
        .spine
        .iter()
        .filter_map(|idref| match package.manifest.get(idref) {
            Some(item) => Some(join_path(content_dir, &item.href)),
            None => {
                debug!(idref = %idref, "spine idref not in manifest, skipping");
                None
            }
        })
        .collect()
}

/// Parse `container.xml`. `rootfile` is only recognised under `rootfiles`.
pub fn parse_container(bytes: &[u8]) -> Result<ContainerDescriptor, MarkupError> {
    let mut container = ContainerDescriptor::default();
    walk_elements(bytes, |ancestors, e| {
        if let [_, parent] = ancestors {
            if parent == "rootfiles" && local_name(e) == "rootfile" {
                let full_path = attribute(e, "full-path")?.unwrap_or_default();
                container.rootfiles.push(full_path);
            }
        }
        Ok(())
    })?;
    Ok(container)
}

/// Parse an OPF package document: `manifest/item` and `spine/itemref`.
pub fn parse_package(bytes: &[u8]) -> Result<PackageDescriptor, MarkupError> {
    let mut package = PackageDescriptor::default();
    walk_elements(bytes, |ancestors, e| {
        let [_, parent] = ancestors else {
            return Ok(());
        };
        match (parent.as_str(), local_name(e).as_str()) {
            ("manifest", "item") => {
                let id = attribute(e, "id")?.unwrap_or_default();
                let item = ManifestItem {
                    href: attribute(e, "href")?.unwrap_or_default(),
                    media_type: attribute(e, "media-type")?.unwrap_or_default(),
                };
                package.manifest.insert(id, item);
            }
            ("spine", "itemref") => {
                package
                    .spine
                    .push(attribute(e, "idref")?.unwrap_or_default());
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(package)
}

/// Walk the first root element of an XML document, calling `visit` for every element
/// start with the local names of its ancestors (root first).
///
/// Content after the root element closes is ignored. Fails when there is no root
/// element or the input ends inside an open element.
fn walk_elements<F>(bytes: &[u8], mut visit: F) -> Result<(), MarkupError>
where
    F: FnMut(&[String], &BytesStart<'_>) -> Result<(), MarkupError>,
{
    let text = String::from_utf8_lossy(strip_bom(bytes));
    let mut reader = Reader::from_str(&text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                visit(stack.as_slice(), &e)?;
                seen_root = true;
                stack.push(local_name(&e));
            }
            Event::Empty(e) => {
                visit(stack.as_slice(), &e)?;
                if stack.is_empty() {
                    return Ok(());
                }
            }
            Event::End(_) => {
                stack.pop();
                if stack.is_empty() {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(MarkupError::Structure(if seen_root {
                    format!("unexpected end of document inside <{}>", stack.join("/"))
                } else {
                    "no root element".to_string()
                }));
            }
            _ => {}
        }
    }
}

/// Extract local name from a namespaced element (e.g. `opf:item` -> `item`).
fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Value of the attribute with local name `name`, unescaped.
fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, MarkupError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() != name.as_bytes() {
            continue;
        }
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw)
            .map(|s| s.into_owned())
            .map_err(|e| MarkupError::Structure(format!("bad escape in {}: {}", name, e)))?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// Directory portion of an archive path; `.` when there is none.
pub(crate) fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Join `href` onto `dir` and collapse `.`, `..`, and empty segments.
/// `href` is always treated as relative to `dir`.
pub(crate) fn join_path(dir: &str, href: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(href.split('/')) {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
