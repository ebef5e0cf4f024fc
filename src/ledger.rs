//! Hash Ledger - content-addressed staleness decisions
//!
//! A locale is stale when the hash recorded for it differs from the hash of
//! the current source. Content files are written before their metadata, so a
//! crash between the two leaves the work pending and re-running redoes it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::WorkspaceLayout;
use crate::hashing::content_hash;
use crate::metadata::{
    AssetMetadata, DocumentMetadata, DocumentRef, GenerationInfo, MetadataStore, SlotInfo,
    TranslationRecord,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid metadata {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Document `{0}` has no metadata; commit its source first")]
    MissingMetadata(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkKind {
    Document,
    ImageSlot,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkReason {
    HashUnchanged,
    SharedAsset,
    Forced,
    NoMetadata,
    NoTranslation,
    HashChanged,
}

impl fmt::Display for WorkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkReason::HashUnchanged => "hash_unchanged",
            WorkReason::SharedAsset => "shared_asset",
            WorkReason::Forced => "forced",
            WorkReason::NoMetadata => "no_metadata",
            WorkReason::NoTranslation => "no_translation",
            WorkReason::HashChanged => "hash_changed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum WorkDecision {
    Skip(WorkReason),
    Required(WorkReason),
}

impl WorkDecision {
    pub fn is_required(&self) -> bool {
        matches!(self, WorkDecision::Required(_))
    }

    pub fn reason(&self) -> WorkReason {
        match self {
            WorkDecision::Skip(r) | WorkDecision::Required(r) => *r,
        }
    }
}

fn compare(recorded: Option<&TranslationRecord>, current_hash: &str) -> WorkDecision {
    match recorded {
        None => WorkDecision::Required(WorkReason::NoTranslation),
        Some(r) if r.source_hash == current_hash => WorkDecision::Skip(WorkReason::HashUnchanged),
        Some(_) => WorkDecision::Required(WorkReason::HashChanged),
    }
}

/// Decide whether a document needs translating into `target`.
pub fn decide_document(
    meta: Option<&DocumentMetadata>,
    target: &str,
    current_hash: &str,
    force: bool,
) -> WorkDecision {
    if force {
        return WorkDecision::Required(WorkReason::Forced);
    }
    match meta {
        None => WorkDecision::Required(WorkReason::NoMetadata),
        Some(m) => compare(m.translations.get(target), current_hash),
    }
}

/// Decide whether an image slot needs a `target` locale rendition.
///
/// Shared (text-free) assets are skipped permanently, even when forced.
pub fn decide_image(
    meta: Option<&AssetMetadata>,
    target: &str,
    current_hash: &str,
    force: bool,
) -> WorkDecision {
    if meta.is_some_and(|m| m.generation.shared) {
        return WorkDecision::Skip(WorkReason::SharedAsset);
    }
    if force {
        return WorkDecision::Required(WorkReason::Forced);
    }
    match meta {
        None => WorkDecision::Required(WorkReason::NoMetadata),
        Some(m) => compare(m.translations.get(target), current_hash),
    }
}

/// Ledger over the workspace sidecars.
#[derive(Debug, Clone)]
pub struct Ledger {
    store: MetadataStore,
}

impl Ledger {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self { store: MetadataStore::new(layout) }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    fn layout(&self) -> &WorkspaceLayout {
        self.store.layout()
    }

    /// `key` is a document path for documents and an asset key for slots.
    pub async fn needs_work(
        &self,
        kind: WorkKind,
        key: &str,
        target: &str,
        current_hash: &str,
        force: bool,
    ) -> Result<WorkDecision, LedgerError> {
        let decision = match kind {
            WorkKind::Document => {
                let meta = self.store.load_document(key).await?;
                decide_document(meta.as_ref(), target, current_hash, force)
            }
            WorkKind::ImageSlot => {
                let meta = self.store.load_asset(key).await?;
                decide_image(meta.as_ref(), target, current_hash, force)
            }
        };
        tracing::debug!(?kind, key, target, ?decision, "ledger decision");
        Ok(decision)
    }

    /// Hash of the document's primary-locale content, if realized.
    pub async fn source_hash(&self, doc_path: &str) -> Result<Option<String>, LedgerError> {
        let path = self.layout().doc_content_path(doc_path, &self.layout().primary_locale);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(content_hash(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LedgerError::Io { path, source }),
        }
    }

    /// Save primary-locale content; creates the sidecar on first save.
    pub async fn commit_source(&self, doc_path: &str, content: &str) -> Result<String, LedgerError> {
        let primary = self.layout().primary_locale.clone();
        self.write_content(doc_path, &primary, content).await?;

        let mut meta = self
            .store
            .load_document(doc_path)
            .await?
            .unwrap_or_else(|| DocumentMetadata::new(&primary));
        meta.add_language(&primary);
        self.store.save_document(doc_path, &meta).await?;
        Ok(content_hash(content))
    }

    /// Save a translated locale, then record the source hash it derives from.
    pub async fn commit_translation(
        &self,
        doc_path: &str,
        locale: &str,
        content: &str,
        source_hash: &str,
    ) -> Result<(), LedgerError> {
        let mut meta = self
            .store
            .load_document(doc_path)
            .await?
            .ok_or_else(|| LedgerError::MissingMetadata(doc_path.to_string()))?;

        self.write_content(doc_path, locale, content).await?;

        meta.add_language(locale);
        meta.translations.insert(
            locale.to_string(),
            TranslationRecord { source_hash: source_hash.to_string(), translated_at: Utc::now() },
        );
        self.store.save_document(doc_path, &meta).await?;
        tracing::info!(doc = doc_path, locale, "translation committed");
        Ok(())
    }

    async fn write_content(&self, doc_path: &str, locale: &str, content: &str) -> Result<(), LedgerError> {
        let dir = self.layout().doc_dir(doc_path);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| LedgerError::Io { path: dir.clone(), source })?;
        let path = self.layout().doc_content_path(doc_path, locale);
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| LedgerError::Io { path, source })
    }

    /// Record a generated image rendition for `locale`.
    pub async fn record_image_generation(
        &self,
        slot: SlotInfo,
        locale: &str,
        source_hash: &str,
        generation: GenerationInfo,
        documents: Vec<DocumentRef>,
    ) -> Result<(), LedgerError> {
        let key = slot.key.clone();
        let mut meta = self
            .store
            .load_asset(&key)
            .await?
            .unwrap_or_else(|| AssetMetadata::new(slot.clone()));

        let was_shared = meta.generation.shared;
        meta.slot = slot;
        meta.generation = GenerationInfo {
            shared: was_shared || generation.shared,
            created_at: generation.created_at.or_else(|| Some(Utc::now())),
            ..generation
        };
        for doc in documents {
            match meta.documents.iter_mut().find(|d| d.path == doc.path) {
                Some(existing) => existing.hash = doc.hash,
                None => meta.documents.push(doc),
            }
        }
        if !meta.languages.iter().any(|l| l == locale) {
            meta.languages.push(locale.to_string());
        }
        meta.translations.insert(
            locale.to_string(),
            TranslationRecord { source_hash: source_hash.to_string(), translated_at: Utc::now() },
        );
        self.store.save_asset(&key, &meta).await
    }

    /// Classify an asset as text-free. There is no way back.
    pub async fn mark_shared(&self, key: &str) -> Result<(), LedgerError> {
        let mut meta = self
            .store
            .load_asset(key)
            .await?
            .unwrap_or_else(|| AssetMetadata::new(SlotInfo { key: key.to_string(), ..Default::default() }));
        if !meta.generation.shared {
            meta.generation.shared = true;
            self.store.save_asset(key, &meta).await?;
            tracing::info!(key, "asset marked shared");
        }
        Ok(())
    }

    /// Whether the primary image is stale relative to a consuming document.
    pub async fn needs_generation(
        &self,
        key: &str,
        doc_path: &str,
        doc_hash: &str,
        force: bool,
    ) -> Result<WorkDecision, LedgerError> {
        if force {
            return Ok(WorkDecision::Required(WorkReason::Forced));
        }
        let decision = match self.store.load_asset(key).await? {
            None => WorkDecision::Required(WorkReason::NoMetadata),
            Some(meta) => match meta.document_hash(doc_path) {
                Some(h) if h == doc_hash => WorkDecision::Skip(WorkReason::HashUnchanged),
                Some(_) => WorkDecision::Required(WorkReason::HashChanged),
                None => WorkDecision::Required(WorkReason::NoTranslation),
            },
        };
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceConfig;
    use tempfile::TempDir;

    fn ledger(dir: &TempDir) -> Ledger {
        let config = WorkspaceConfig { locale: Some("en".into()), ..Default::default() };
        Ledger::new(WorkspaceLayout::from_config(dir.path(), config).unwrap())
    }

    #[test]
    fn test_force_always_required() {
        let meta = DocumentMetadata::new("en");
        let d = decide_document(Some(&meta), "fr", "h", true);
        assert_eq!(d, WorkDecision::Required(WorkReason::Forced));
    }

    #[test]
    fn test_shared_image_skips_permanently() {
        let mut meta = AssetMetadata::default();
        meta.generation.shared = true;
        assert_eq!(decide_image(Some(&meta), "fr", "h", false), WorkDecision::Skip(WorkReason::SharedAsset));
        assert_eq!(decide_image(Some(&meta), "fr", "h", true), WorkDecision::Skip(WorkReason::SharedAsset));
        assert_eq!(decide_image(None, "fr", "h", false), WorkDecision::Required(WorkReason::NoMetadata));
    }

    #[test]
    fn test_decision_wire_format() {
        let json = serde_json::to_value(WorkDecision::Skip(WorkReason::HashUnchanged)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "skip", "reason": "hash_unchanged"}));
    }

    #[tokio::test]
    async fn test_commit_then_skip() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);

        let hash = ledger.commit_source("/guide", "# Guide\n\nBody").await.unwrap();
        assert_eq!(ledger.source_hash("/guide").await.unwrap().as_deref(), Some(hash.as_str()));

        let first = ledger.needs_work(WorkKind::Document, "/guide", "fr", &hash, false).await.unwrap();
        assert_eq!(first, WorkDecision::Required(WorkReason::NoTranslation));

        ledger.commit_translation("/guide", "fr", "# Guide FR", &hash).await.unwrap();
        for _ in 0..2 {
            let again = ledger.needs_work(WorkKind::Document, "/guide", "fr", &hash, false).await.unwrap();
            assert_eq!(again, WorkDecision::Skip(WorkReason::HashUnchanged));
        }

        let meta = ledger.store().load_document("/guide").await.unwrap().unwrap();
        assert_eq!(meta.languages, vec!["en", "fr"]);
        assert_eq!(meta.source, "en");
    }

    #[tokio::test]
    async fn test_translation_requires_metadata() {
        let dir = TempDir::new().unwrap();
        let err = ledger(&dir).commit_translation("/nope", "fr", "x", "h").await.unwrap_err();
        assert!(matches!(err, LedgerError::MissingMetadata(_)));
    }

    #[tokio::test]
    async fn test_shared_is_one_way() {
        let dir = TempDir::new().unwrap();
        let ledger = ledger(&dir);
        let slot = SlotInfo { id: "x".into(), key: "k".into(), desc: "d".into() };

        ledger.mark_shared("k").await.unwrap();
        let generation = GenerationInfo { model: "m".into(), shared: false, ..Default::default() };
        ledger
            .record_image_generation(slot, "en", "h", generation, vec![DocumentRef { path: "/a".into(), hash: "d1".into() }])
            .await
            .unwrap();

        let meta = ledger.store().load_asset("k").await.unwrap().unwrap();
        assert!(meta.generation.shared);
        assert_eq!(
            ledger.needs_generation("k", "/a", "d1", false).await.unwrap(),
            WorkDecision::Skip(WorkReason::HashUnchanged)
        );
        assert!(ledger.needs_generation("k", "/a", "d2", false).await.unwrap().is_required());
    }
}
