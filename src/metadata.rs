//! Metadata sidecars
//!
//! One `.meta.yaml` per document folder and per asset key. These are the
//! ledger's memory of which source hash each realized locale was built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::WorkspaceLayout;
use crate::ledger::LedgerError;

pub const DOC_KIND: &str = "doc";
pub const IMAGE_KIND: &str = "image";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub source_hash: String,
    pub translated_at: DateTime<Utc>,
}

/// Sidecar of a document folder.
///
/// Fields default to empty so that a partially written sidecar still parses;
/// [`DocumentMetadata::missing_fields`] reports what is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, TranslationRecord>,
}

impl DocumentMetadata {
    pub fn new(primary_locale: &str) -> Self {
        Self {
            kind: DOC_KIND.to_string(),
            source: primary_locale.to_string(),
            default: primary_locale.to_string(),
            languages: vec![primary_locale.to_string()],
            translations: BTreeMap::new(),
        }
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.kind.trim().is_empty() {
            missing.push("kind");
        }
        if self.source.trim().is_empty() {
            missing.push("source");
        }
        if self.default.trim().is_empty() {
            missing.push("default");
        }
        missing
    }

    pub fn add_language(&mut self, locale: &str) {
        if !self.languages.iter().any(|l| l == locale) {
            self.languages.push(locale.to_string());
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotInfo {
    pub id: String,
    pub key: String,
    pub desc: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInfo {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Text-free image; once true, never translated per locale.
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    pub path: String,
    pub hash: String,
}

/// Sidecar of an image asset key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetMetadata {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub slot: SlotInfo,
    #[serde(default)]
    pub generation: GenerationInfo,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, TranslationRecord>,
}

impl AssetMetadata {
    pub fn new(slot: SlotInfo) -> Self {
        Self { kind: IMAGE_KIND.to_string(), slot, ..Default::default() }
    }

    pub fn document_hash(&self, doc_path: &str) -> Option<&str> {
        self.documents.iter().find(|d| d.path == doc_path).map(|d| d.hash.as_str())
    }
}

/// Reads and writes sidecars under the workspace layout.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    layout: WorkspaceLayout,
}

impl MetadataStore {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub async fn load_document(&self, doc_path: &str) -> Result<Option<DocumentMetadata>, LedgerError> {
        read_yaml(&self.layout.doc_meta_path(doc_path)).await
    }

    pub async fn save_document(&self, doc_path: &str, meta: &DocumentMetadata) -> Result<(), LedgerError> {
        write_yaml(&self.layout.doc_meta_path(doc_path), meta).await
    }

    pub async fn load_asset(&self, key: &str) -> Result<Option<AssetMetadata>, LedgerError> {
        read_yaml(&self.layout.asset_meta_path(key)).await
    }

    pub async fn save_asset(&self, key: &str, meta: &AssetMetadata) -> Result<(), LedgerError> {
        write_yaml(&self.layout.asset_meta_path(key), meta).await
    }
}

async fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, LedgerError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LedgerError::Io { path: path.to_path_buf(), source }),
    };
    serde_yaml::from_str(&raw)
        .map(Some)
        .map_err(|source| LedgerError::Parse { path: path.to_path_buf(), source })
}

async fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let yaml = serde_yaml::to_string(value).map_err(|source| LedgerError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let parent: PathBuf = path.parent().map(Path::to_path_buf).unwrap_or_default();
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|source| LedgerError::Io { path: parent, source })?;
    tokio::fs::write(path, yaml)
        .await
        .map_err(|source| LedgerError::Io { path: path.to_path_buf(), source })
}
