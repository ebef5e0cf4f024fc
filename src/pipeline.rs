//! Doc Pipeline - Single Entry Point
//!
//! CRITICAL: check_content MUST validate the structure first. No bypass.

use std::path::Path;
use std::sync::Arc;

use crate::config::WorkspaceLayout;
use crate::content::probe::RemoteProbe;
use crate::content::{ContentCheckRequest, ContentReport, ContentValidator};
use crate::error::{Error, Result};
use crate::ledger::{Ledger, WorkDecision, WorkKind};
use crate::planner::{ImageTask, PlanOutcome, PlanRequest, Planner, TranslationTask};
use crate::schema::{check_structure, validate_structure, StructureOutcome};
use crate::slots::{render_slots, RenderedSlots};
use crate::structure::{load_structure_value, StructureDescriptor};

/// The workspace pipeline - every operation goes through here
pub struct DocPipeline {
    layout: WorkspaceLayout,
    ledger: Ledger,
    probe: Option<Arc<dyn RemoteProbe>>,
}

impl DocPipeline {
    /// Load `config.yaml` once and bind every component to the resulting layout.
    pub async fn open(root: &Path) -> Result<Self> {
        let layout = WorkspaceLayout::load(root).await?;
        tracing::info!(
            root = %root.display(),
            locale = layout.primary_locale.as_str(),
            targets = ?layout.translate_languages,
            "workspace opened"
        );
        Ok(Self::from_layout(layout))
    }

    pub fn from_layout(layout: WorkspaceLayout) -> Self {
        Self { ledger: Ledger::new(layout.clone()), layout, probe: None }
    }

    /// Replace the HTTP probe used for remote images.
    pub fn with_probe(mut self, probe: Arc<dyn RemoteProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Validate the structure file; with `fix`, correct, persist and re-validate once.
    pub async fn check_structure(&self, fix: bool) -> Result<StructureOutcome> {
        let (outcome, _) = check_structure(&self.layout, fix).await?;
        Ok(outcome)
    }

    /// Load the descriptor, refusing one with fatal or fixable findings.
    pub async fn load_structure(&self) -> Result<StructureDescriptor> {
        let value = load_structure_value(&self.layout.structure_file).await?;
        let report = validate_structure(&value);
        if !report.valid {
            return Err(Error::InvalidStructure {
                fatal: report.errors.fatal.len(),
                fixable: report.errors.fixable.len(),
            });
        }
        Ok(StructureDescriptor::from_value(&value)?)
    }

    /// Validate document content.
    ///
    /// This ALWAYS validates the structure first.
    pub async fn check_content(&self, request: &ContentCheckRequest) -> Result<ContentReport> {
        let structure = self.load_structure().await?;
        let mut validator = ContentValidator::new(self.layout.clone());
        if let Some(probe) = &self.probe {
            validator = validator.with_probe(Arc::clone(probe));
        }
        validator.validate(&structure, request).await
    }

    pub async fn plan_translations(&self, request: &PlanRequest) -> Result<PlanOutcome<TranslationTask>> {
        let structure = self.load_structure().await?;
        let planner = Planner::new(&structure, self.ledger.clone());
        Ok(planner.plan(request)?)
    }

    pub async fn plan_images(&self, request: &PlanRequest) -> Result<PlanOutcome<ImageTask>> {
        let structure = self.load_structure().await?;
        Planner::new(&structure, self.ledger.clone()).plan_images(request).await
    }

    /// Re-check a planned translation right before it runs.
    pub async fn check_task(&self, task: &TranslationTask) -> Result<WorkDecision> {
        let structure = self.load_structure().await?;
        Planner::new(&structure, self.ledger.clone()).check_task(task).await
    }

    pub async fn needs_work(
        &self,
        kind: WorkKind,
        key: &str,
        target: &str,
        current_hash: &str,
        force: bool,
    ) -> Result<WorkDecision> {
        Ok(self.ledger.needs_work(kind, key, target, current_hash, force).await?)
    }

    /// A locale's content with every resolvable slot marker replaced.
    pub async fn render_document(&self, doc_path: &str, locale: &str) -> Result<RenderedSlots> {
        let path = self.layout.doc_content_path(doc_path, locale);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        Ok(render_slots(&self.layout, &content, doc_path, locale).await)
    }
}
