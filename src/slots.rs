//! Image slots and asset binding
//!
//! A slot marker reserves a spot for a generated image:
//! `<!-- afs:image id="..." key="..." desc="..." -->`.
//! Assets live under `assets/<key>/images/<locale>.<ext>`; a missing locale
//! falls back to the primary locale's rendition.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::WorkspaceLayout;
use crate::hashing::{canonical_hash, sha256_hex};
use crate::markdown::{code_ranges, in_ranges, tokenize};
use crate::metadata::SlotInfo;

/// Prefix of rendered asset references inside document content.
pub const ASSET_REF_PREFIX: &str = "/assets/";
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "svg"];

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--\s*afs:image\b(.*?)-->").expect("valid marker regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSlot {
    pub id: String,
    pub key: String,
    pub desc: String,
    /// Marker text exactly as written.
    pub raw: String,
    pub offset: usize,
}

impl ImageSlot {
    pub fn info(&self) -> SlotInfo {
        SlotInfo { id: self.id.clone(), key: self.key.clone(), desc: self.desc.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedSlot {
    pub raw: String,
    pub offset: usize,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct SlotScan {
    pub slots: Vec<ImageSlot>,
    pub malformed: Vec<MalformedSlot>,
}

/// Scan content for slot markers outside code.
pub fn scan_slots(content: &str, doc_path: &str) -> SlotScan {
    let code = code_ranges(&tokenize(content));
    let mut scan = SlotScan::default();

    for cap in MARKER_RE.captures_iter(content) {
        let Some(whole) = cap.get(0) else { continue };
        if in_ranges(&code, whole.start()) {
            continue;
        }
        let attrs = cap.get(1).map_or("", |m| m.as_str());
        let mut id = None;
        let mut key = None;
        let mut desc = None;
        for a in ATTR_RE.captures_iter(attrs) {
            let value = a.get(2).or_else(|| a.get(3)).map(|m| m.as_str().trim().to_string());
            match &a[1] {
                "id" => id = value,
                "key" => key = value,
                "desc" => desc = value,
                _ => {}
            }
        }

        let id = id.filter(|s| !s.is_empty());
        let desc = desc.filter(|s| !s.is_empty());
        match (id, desc) {
            (Some(id), Some(desc)) => {
                let key = key
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| default_slot_key(doc_path, &id));
                scan.slots.push(ImageSlot {
                    id,
                    key,
                    desc,
                    raw: whole.as_str().to_string(),
                    offset: whole.start(),
                });
            }
            (id, desc) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("id");
                }
                if desc.is_none() {
                    missing.push("desc");
                }
                scan.malformed.push(MalformedSlot {
                    raw: whole.as_str().to_string(),
                    offset: whole.start(),
                    missing,
                });
            }
        }
    }
    scan
}

pub fn parse_slots(content: &str, doc_path: &str) -> Vec<ImageSlot> {
    scan_slots(content, doc_path).slots
}

/// Stable key for a slot whose author gave none.
pub fn default_slot_key(doc_path: &str, id: &str) -> String {
    let digest = sha256_hex(format!("{doc_path}#{id}").as_bytes());
    format!("{}-{}", slug(id), &digest[..12])
}

/// Hash of what the image is supposed to depict.
pub fn slot_hash(slot: &ImageSlot) -> String {
    // SlotInfo only holds strings; serialization cannot fail.
    canonical_hash(&slot.info()).unwrap_or_else(|_| sha256_hex(slot.raw.as_bytes()))
}

fn slug(s: &str) -> String {
    let mut out = String::new();
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "slot".to_string()
    } else {
        trimmed.to_string()
    }
}

async fn locale_file(layout: &WorkspaceLayout, key: &str, locale: &str) -> Option<PathBuf> {
    let dir = layout.asset_images_dir(key);
    for ext in IMAGE_EXTENSIONS {
        let candidate = dir.join(format!("{locale}.{ext}"));
        if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Some(candidate);
        }
    }
    None
}

/// Locate the asset for `target`, falling back to the primary locale.
pub async fn resolve_asset(
    layout: &WorkspaceLayout,
    key: &str,
    target: &str,
    primary: &str,
) -> Option<PathBuf> {
    if let Some(found) = locale_file(layout, key, target).await {
        return Some(found);
    }
    if target != primary {
        return locale_file(layout, key, primary).await;
    }
    None
}

/// Content-relative reference to a resolved asset file.
pub fn asset_reference(key: &str, file: &std::path::Path) -> String {
    let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{ASSET_REF_PREFIX}{key}/images/{name}")
}

#[derive(Debug, Clone)]
pub struct RenderedSlots {
    pub content: String,
    pub unresolved: Vec<ImageSlot>,
}

/// Replace resolvable markers with image references; leave the rest in place.
pub async fn render_slots(
    layout: &WorkspaceLayout,
    content: &str,
    doc_path: &str,
    locale: &str,
) -> RenderedSlots {
    let scan = scan_slots(content, doc_path);
    let mut out = String::with_capacity(content.len());
    let mut unresolved = Vec::new();
    let mut cursor = 0;

    for slot in scan.slots {
        out.push_str(&content[cursor..slot.offset]);
        cursor = slot.offset + slot.raw.len();
        match resolve_asset(layout, &slot.key, locale, &layout.primary_locale).await {
            Some(file) => {
                out.push_str(&format!("![{}]({})", slot.desc, asset_reference(&slot.key, &file)));
            }
            None => {
                out.push_str(&slot.raw);
                unresolved.push(slot);
            }
        }
    }
    out.push_str(&content[cursor..]);
    RenderedSlots { content: out, unresolved }
}
