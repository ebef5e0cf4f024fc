//! Link and image reference classification.
//!
//! A document path denotes a folder; relative references resolve against
//! that folder, and may climb at most as many levels as the path is deep.

use crate::config::CONTENT_SUFFIX;
use crate::slots::ASSET_REF_PREFIX;

/// Reserved prefix resolving against the configured source roots.
pub const VIRTUAL_SOURCE_PREFIX: &str = "/sources/";

const EXTERNAL_SCHEMES: [&str; 5] = ["http://", "https://", "mailto:", "tel:", "ftp://"];

const RESOURCE_EXTENSIONS: &[&str] = &[
    // archives
    "zip", "tar", "gz", "tgz", "rar", "7z",
    // office documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "txt",
    // media
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "mp3", "mp4", "wav", "mov", "avi", "webm",
    // source code and data
    "js", "mjs", "ts", "jsx", "tsx", "py", "rs", "go", "java", "c", "cpp", "h", "rb", "php",
    "sh", "json", "yaml", "yml", "toml", "xml",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    Empty,
    Anchor,
    External,
    /// Link to a downloadable resource rather than a document.
    Resource,
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkResolution {
    Resolved(String),
    ExceedsRoot,
    /// Target names the content file; carries the folder path it should use.
    HasFileSuffix(String),
}

/// Drop `#fragment` and `?query`.
fn strip_decorations(dest: &str) -> &str {
    let end = dest.find(['#', '?']).unwrap_or(dest.len());
    &dest[..end]
}

fn extension(target: &str) -> Option<String> {
    let last = target.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

pub fn is_external(dest: &str) -> bool {
    let lower = dest.to_ascii_lowercase();
    EXTERNAL_SCHEMES.iter().any(|s| lower.starts_with(s)) || lower.starts_with("//")
}

/// Email autolinks (`<team@example.com>`) carry the bare address as destination.
fn is_email(dest: &str) -> bool {
    match dest.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !dest.contains('/'),
        None => false,
    }
}

pub fn classify_link(dest: &str) -> LinkClass {
    let dest = dest.trim();
    if dest.is_empty() {
        return LinkClass::Empty;
    }
    if dest.starts_with('#') {
        return LinkClass::Anchor;
    }
    if is_external(dest) || is_email(dest) {
        return LinkClass::External;
    }
    let target = strip_decorations(dest);
    if target.is_empty() {
        return LinkClass::Anchor;
    }
    match extension(target) {
        Some(ext) if RESOURCE_EXTENSIONS.contains(&ext.as_str()) => LinkClass::Resource,
        _ => LinkClass::Internal(target.to_string()),
    }
}

/// Resolve an internal target against the document's folder path.
pub fn resolve_internal(doc_path: &str, target: &str) -> LinkResolution {
    let mut segments: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        doc_path.split('/').filter(|s| !s.is_empty()).collect()
    };

    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return LinkResolution::ExceedsRoot;
                }
            }
            other => segments.push(other),
        }
    }

    let resolved = format!("/{}", segments.join("/"));
    if resolved.to_ascii_lowercase().ends_with(CONTENT_SUFFIX) {
        let folder = &resolved[..resolved.len() - CONTENT_SUFFIX.len()];
        return LinkResolution::HasFileSuffix(folder.to_string());
    }
    LinkResolution::Resolved(resolved)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Skip,
    Remote(String),
    SlotAsset(String),
    Virtual(String),
    Absolute(String),
    Relative(String),
}

pub fn classify_image(dest: &str) -> ImageRef {
    let dest = dest.trim();
    if dest.is_empty() || dest.starts_with("data:") {
        return ImageRef::Skip;
    }
    let lower = dest.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return ImageRef::Remote(dest.to_string());
    }
    let target = strip_decorations(dest);
    if target.starts_with(ASSET_REF_PREFIX) {
        ImageRef::SlotAsset(target.to_string())
    } else if let Some(rest) = target.strip_prefix(VIRTUAL_SOURCE_PREFIX) {
        ImageRef::Virtual(rest.to_string())
    } else if target.starts_with('/') {
        ImageRef::Absolute(target.to_string())
    } else {
        ImageRef::Relative(target.to_string())
    }
}
