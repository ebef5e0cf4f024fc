//! Task Planner - documents x target languages
//!
//! Document tasks are planned without consulting the ledger: whether a task
//! is still needed is decided by re-hashing right before it runs
//! ([`Planner::check_task`]). Image tasks carry their decision eagerly.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::error::Result;
use crate::ledger::{Ledger, WorkDecision, WorkKind};
use crate::slots::{parse_slots, slot_hash};
use crate::structure::StructureDescriptor;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Unknown document path(s): {}", .0.join(", "))]
    UnknownDocuments(Vec<String>),

    #[error("No documents selected")]
    EmptyTaskList,

    #[error("Document `{0}` has no source content to translate from")]
    MissingSource(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub documents: Option<Vec<String>>,
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanSkipReason {
    /// Every requested target is the primary locale.
    AllTargetsEqualSource,
    NoTargetLanguages,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanOutcome<T> {
    Skipped { reason: PlanSkipReason },
    Planned { tasks: Vec<T> },
}

impl<T> PlanOutcome<T> {
    pub fn tasks(&self) -> &[T] {
        match self {
            PlanOutcome::Skipped { .. } => &[],
            PlanOutcome::Planned { tasks } => tasks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslationTask {
    pub path: String,
    pub source_language: String,
    pub target_language: String,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageTask {
    pub key: String,
    pub slot_id: String,
    pub document: String,
    pub target_language: String,
    pub decision: WorkDecision,
}

/// The requested paths (deduplicated, in request order), or every path.
///
/// Any path outside `ordered` is rejected before work starts.
pub fn select_documents(
    ordered: &[String],
    requested: Option<&[String]>,
) -> Result<Vec<String>, PlanError> {
    let docs = match requested {
        Some(requested) => {
            let known: HashSet<&str> = ordered.iter().map(String::as_str).collect();
            let unknown: Vec<String> =
                requested.iter().filter(|p| !known.contains(p.as_str())).cloned().collect();
            if !unknown.is_empty() {
                return Err(PlanError::UnknownDocuments(unknown));
            }
            let mut seen = HashSet::new();
            requested.iter().filter(|p| seen.insert(p.as_str())).cloned().collect()
        }
        None => ordered.to_vec(),
    };
    if docs.is_empty() {
        return Err(PlanError::EmptyTaskList);
    }
    Ok(docs)
}

pub struct Planner {
    paths: Vec<String>,
    ledger: Ledger,
}

impl Planner {
    pub fn new(structure: &StructureDescriptor, ledger: Ledger) -> Self {
        Self { paths: structure.ordered_paths(), ledger }
    }

    fn primary(&self) -> &str {
        &self.ledger.store().layout().primary_locale
    }

    fn resolve_documents(&self, requested: Option<&[String]>) -> Result<Vec<String>, PlanError> {
        select_documents(&self.paths, requested)
    }

    fn resolve_targets(&self, requested: &[String]) -> Result<Vec<String>, PlanSkipReason> {
        if requested.iter().all(|l| l.trim().is_empty()) {
            return Err(PlanSkipReason::NoTargetLanguages);
        }
        let mut targets: Vec<String> = Vec::new();
        for lang in requested.iter().map(|l| l.trim()) {
            if !lang.is_empty() && lang != self.primary() && !targets.iter().any(|t| t == lang) {
                targets.push(lang.to_string());
            }
        }
        if targets.is_empty() {
            return Err(PlanSkipReason::AllTargetsEqualSource);
        }
        Ok(targets)
    }

    /// Documents x (targets - primary locale).
    pub fn plan(&self, request: &PlanRequest) -> Result<PlanOutcome<TranslationTask>, PlanError> {
        let docs = self.resolve_documents(request.documents.as_deref())?;
        let targets = match self.resolve_targets(&request.target_languages) {
            Ok(t) => t,
            Err(reason) => {
                tracing::info!(?reason, "translation plan skipped");
                return Ok(PlanOutcome::Skipped { reason });
            }
        };

        let source = self.primary().to_string();
        let tasks: Vec<TranslationTask> = docs
            .iter()
            .flat_map(|path| {
                targets.iter().map(|target| TranslationTask {
                    path: path.clone(),
                    source_language: source.clone(),
                    target_language: target.clone(),
                    force: request.force,
                })
            })
            .collect();
        tracing::info!(documents = docs.len(), targets = targets.len(), tasks = tasks.len(), "translation plan built");
        Ok(PlanOutcome::Planned { tasks })
    }

    /// Re-hash the source and consult the ledger immediately before running a task.
    pub async fn check_task(&self, task: &TranslationTask) -> Result<WorkDecision> {
        let hash = self
            .ledger
            .source_hash(&task.path)
            .await?
            .ok_or_else(|| PlanError::MissingSource(task.path.clone()))?;
        let decision = self
            .ledger
            .needs_work(WorkKind::Document, &task.path, &task.target_language, &hash, task.force)
            .await?;
        Ok(decision)
    }

    /// One task per (slot key, target), decided against the asset sidecars.
    pub async fn plan_images(&self, request: &PlanRequest) -> Result<PlanOutcome<ImageTask>> {
        let docs = self.resolve_documents(request.documents.as_deref())?;
        let targets = match self.resolve_targets(&request.target_languages) {
            Ok(t) => t,
            Err(reason) => return Ok(PlanOutcome::Skipped { reason }),
        };

        let layout = self.ledger.store().layout();
        let mut seen_keys = HashSet::new();
        let mut tasks = Vec::new();
        for doc in &docs {
            let path = layout.doc_content_path(doc, self.primary());
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                tracing::debug!(doc = doc.as_str(), "no source content; no image slots planned");
                continue;
            };
            for slot in parse_slots(&content, doc) {
                if !seen_keys.insert(slot.key.clone()) {
                    continue;
                }
                let hash = slot_hash(&slot);
                for target in &targets {
                    let decision = self
                        .ledger
                        .needs_work(WorkKind::ImageSlot, &slot.key, target, &hash, request.force)
                        .await?;
                    tasks.push(ImageTask {
                        key: slot.key.clone(),
                        slot_id: slot.id.clone(),
                        document: doc.clone(),
                        target_language: target.clone(),
                        decision,
                    });
                }
            }
        }
        Ok(PlanOutcome::Planned { tasks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WorkspaceConfig, WorkspaceLayout};
    use crate::structure::{DocumentNode, ProjectInfo};
    use std::path::Path;

    fn node(path: &str) -> DocumentNode {
        DocumentNode {
            path: path.into(),
            title: "T".into(),
            description: "D".into(),
            source_paths: vec![],
            icon: None,
            children: vec![],
        }
    }

    fn planner() -> Planner {
        let structure = StructureDescriptor {
            project: ProjectInfo { title: "P".into(), description: "D".into() },
            documents: vec![node("/a"), node("/b")],
        };
        let config = WorkspaceConfig { locale: Some("en".into()), ..Default::default() };
        let layout = WorkspaceLayout::from_config(Path::new("/nonexistent"), config).unwrap();
        Planner::new(&structure, Ledger::new(layout))
    }

    fn request(docs: Option<&[&str]>, langs: &[&str]) -> PlanRequest {
        PlanRequest {
            documents: docs.map(|d| d.iter().map(|s| s.to_string()).collect()),
            target_languages: langs.iter().map(|s| s.to_string()).collect(),
            force: false,
        }
    }

    #[test]
    fn test_cartesian_product_minus_primary() {
        let outcome = planner().plan(&request(None, &["fr", "en", "de", "fr"])).unwrap();
        let pairs: Vec<_> = outcome
            .tasks()
            .iter()
            .map(|t| (t.path.as_str(), t.target_language.as_str()))
            .collect();
        assert_eq!(pairs, vec![("/a", "fr"), ("/a", "de"), ("/b", "fr"), ("/b", "de")]);
        assert!(outcome.tasks().iter().all(|t| t.source_language == "en"));
    }

    #[test]
    fn test_all_targets_equal_source() {
        let outcome = planner().plan(&request(None, &["en"])).unwrap();
        assert_eq!(outcome, PlanOutcome::Skipped { reason: PlanSkipReason::AllTargetsEqualSource });
    }

    #[test]
    fn test_unknown_document_aborts() {
        let err = planner().plan(&request(Some(&["/a", "/zzz"]), &["fr"])).unwrap_err();
        match err {
            PlanError::UnknownDocuments(paths) => assert_eq!(paths, vec!["/zzz"]),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_empty_document_request() {
        let err = planner().plan(&request(Some(&[]), &["fr"])).unwrap_err();
        assert!(matches!(err, PlanError::EmptyTaskList));
    }

    #[test]
    fn test_outcome_wire_format() {
        let skipped: PlanOutcome<TranslationTask> =
            PlanOutcome::Skipped { reason: PlanSkipReason::AllTargetsEqualSource };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json, serde_json::json!({"status": "skipped", "reason": "all_targets_equal_source"}));
    }
}
