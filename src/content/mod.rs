//! Content Validation - per-document layered checks
//!
//! Every selected document is loaded once and handed to each rule in turn:
//! existence, structural content, links and images, and (when requested)
//! slot resolution. Documents share nothing but the remote-probe cache, so
//! they are checked concurrently over a bounded pool.

pub mod links;
pub mod probe;
pub mod rules;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::WorkspaceLayout;
use crate::error::Result;
use crate::markdown::{tokenize, Token};
use crate::metadata::{DocumentMetadata, MetadataStore};
use crate::planner::select_documents;
use crate::structure::StructureDescriptor;
use crate::validation::{render_report, ValidationViolation, ViolationSet};

use probe::{HttpProbe, ProbeCache, RemoteProbe};
use rules::{ContentRule, ExistenceRule, ImageRule, LinkRule, SlotRule, StructuralRule};

/// Input of a content check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCheckRequest {
    /// Restrict the check to these paths; all registered documents otherwise.
    #[serde(default)]
    pub documents: Option<Vec<String>>,
    #[serde(default)]
    pub check_slots: bool,
    #[serde(default)]
    pub probe_remote: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContentStats {
    pub documents_checked: usize,
    pub links_checked: usize,
    pub images_checked: usize,
    pub slots_checked: usize,
    pub broken_links: usize,
    pub missing_images: usize,
}

impl ContentStats {
    fn absorb(&mut self, other: &ContentStats) {
        self.documents_checked += other.documents_checked;
        self.links_checked += other.links_checked;
        self.images_checked += other.images_checked;
        self.slots_checked += other.slots_checked;
        self.broken_links += other.broken_links;
        self.missing_images += other.missing_images;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentReport {
    pub run_id: Uuid,
    pub valid: bool,
    pub errors: ViolationSet,
    pub stats: ContentStats,
}

impl ContentReport {
    pub fn render(&self) -> String {
        render_report(
            "Document content check",
            &[
                ("documents checked", self.stats.documents_checked),
                ("links checked", self.stats.links_checked),
                ("images checked", self.stats.images_checked),
                ("slots checked", self.stats.slots_checked),
                ("broken links", self.stats.broken_links),
                ("missing images", self.stats.missing_images),
            ],
            &self.errors,
        )
    }
}

/// Findings of one document.
#[derive(Debug, Default)]
pub struct Findings {
    pub violations: Vec<ValidationViolation>,
    pub stats: ContentStats,
}

impl Findings {
    pub fn push(&mut self, violation: ValidationViolation) {
        self.violations.push(violation);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    Missing,
    NotDirectory,
    Present,
}

#[derive(Debug, Clone)]
pub enum MetaState {
    Missing,
    Invalid(String),
    Loaded(DocumentMetadata),
}

/// One realized locale file.
#[derive(Debug, Clone)]
pub struct RealizedFile {
    pub locale: String,
    pub path: PathBuf,
    pub content: String,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: String,
    pub folder: FolderState,
    pub meta: MetaState,
    pub files: Vec<RealizedFile>,
}

impl LoadedDocument {
    pub fn has_locale(&self, locale: &str) -> bool {
        self.files.iter().any(|f| f.locale == locale)
    }
}

/// Shared, read-only state of one validation run.
pub struct CheckContext<'a> {
    pub layout: &'a WorkspaceLayout,
    pub registered: &'a BTreeSet<String>,
    pub request: &'a ContentCheckRequest,
    pub probe: Option<&'a ProbeCache>,
}

pub struct ContentValidator {
    layout: WorkspaceLayout,
    store: MetadataStore,
    rules: Vec<Box<dyn ContentRule>>,
    probe: Option<Arc<dyn RemoteProbe>>,
}

impl ContentValidator {
    pub fn new(layout: WorkspaceLayout) -> Self {
        Self {
            store: MetadataStore::new(layout.clone()),
            layout,
            rules: vec![
                Box::new(ExistenceRule),
                Box::new(StructuralRule),
                Box::new(LinkRule),
                Box::new(ImageRule),
                Box::new(SlotRule),
            ],
            probe: None,
        }
    }

    /// Replace the HTTP probe used when remote probing is requested.
    pub fn with_probe(mut self, probe: Arc<dyn RemoteProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    fn probe_cache(&self, request: &ContentCheckRequest) -> Option<ProbeCache> {
        if !request.probe_remote {
            return None;
        }
        if let Some(probe) = &self.probe {
            return Some(ProbeCache::new(Arc::clone(probe)));
        }
        match HttpProbe::new(self.layout.probe_timeout) {
            Ok(http) => Some(ProbeCache::new(Arc::new(http))),
            Err(e) => {
                tracing::warn!(error = %e, "HTTP client unavailable; remote images not probed");
                None
            }
        }
    }

    pub async fn validate(
        &self,
        structure: &StructureDescriptor,
        request: &ContentCheckRequest,
    ) -> Result<ContentReport> {
        let registered = structure.all_paths();
        let selected = select_documents(&structure.ordered_paths(), request.documents.as_deref())?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("content_check", %run_id, documents = selected.len());
        self.run(run_id, &selected, &registered, request).instrument(span).await
    }

    async fn run(
        &self,
        run_id: Uuid,
        selected: &[String],
        registered: &BTreeSet<String>,
        request: &ContentCheckRequest,
    ) -> Result<ContentReport> {
        let probe = self.probe_cache(request);
        let ctx = CheckContext {
            layout: &self.layout,
            registered,
            request,
            probe: probe.as_ref(),
        };

        let mut results: Vec<(usize, Findings)> = stream::iter(selected.iter().enumerate())
            .map(|(i, path)| {
                let ctx = &ctx;
                async move { (i, self.check_document(ctx, path).await) }
            })
            .buffer_unordered(self.layout.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(i, _)| *i);

        let mut errors = ViolationSet::default();
        let mut stats = ContentStats::default();
        for (_, findings) in results {
            stats.absorb(&findings.stats);
            errors.extend(findings.violations);
        }

        tracing::info!(
            fatal = errors.fatal.len(),
            warnings = errors.warnings.len(),
            broken_links = stats.broken_links,
            "content validated"
        );
        Ok(ContentReport { run_id, valid: errors.is_valid(), errors, stats })
    }

    async fn check_document(&self, ctx: &CheckContext<'_>, doc_path: &str) -> Findings {
        let doc = self.load_document(doc_path).await;
        let mut findings = Findings::default();
        findings.stats.documents_checked = 1;
        for rule in &self.rules {
            rule.check(&doc, ctx, &mut findings).await;
        }
        tracing::debug!(doc = doc_path, findings = findings.violations.len(), "document checked");
        findings
    }

    async fn load_document(&self, doc_path: &str) -> LoadedDocument {
        let dir = self.layout.doc_dir(doc_path);
        let folder = match tokio::fs::metadata(&dir).await {
            Ok(m) if m.is_dir() => FolderState::Present,
            Ok(_) => FolderState::NotDirectory,
            Err(_) => FolderState::Missing,
        };
        if folder != FolderState::Present {
            return LoadedDocument {
                path: doc_path.to_string(),
                folder,
                meta: MetaState::Missing,
                files: vec![],
            };
        }

        let meta = match self.store.load_document(doc_path).await {
            Ok(Some(m)) => MetaState::Loaded(m),
            Ok(None) => MetaState::Missing,
            Err(e) => MetaState::Invalid(e.to_string()),
        };

        let mut locales = self.layout.required_locales();
        if let MetaState::Loaded(m) = &meta {
            for l in [&m.default, &m.source].into_iter().chain(m.languages.iter()) {
                if !l.is_empty() && !locales.contains(l) {
                    locales.push(l.clone());
                }
            }
        }

        let mut files = Vec::new();
        for locale in locales {
            let path = self.layout.doc_content_path(doc_path, &locale);
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                let tokens = tokenize(&content);
                files.push(RealizedFile { locale, path, content, tokens });
            }
        }

        LoadedDocument { path: doc_path.to_string(), folder, meta, files }
    }
}
