//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

mod common;

use pretty_assertions::assert_eq;

use common::{page, Workspace};
use docforge_core::{
    hashing::canonical_json, ContentCheckRequest, Error, ErrorCategory, PlanOutcome, PlanRequest,
    ViolationCode, WorkDecision, WorkKind, WorkReason,
};

fn plan_request(langs: &[&str]) -> PlanRequest {
    PlanRequest {
        documents: None,
        target_languages: langs.iter().map(|s| s.to_string()).collect(),
        force: false,
    }
}

#[tokio::test]
async fn invariant_content_check_validates_structure_first() {
    // Missing icon on a top-level node is fatal; content checking must refuse.
    let ws = Workspace::new(
        "locale: en\n",
        "project:\n  title: P\n  description: D\ndocuments:\n  - path: /a\n    title: A\n    description: D\n",
    );
    ws.write_doc("/a", &page("A", ""));

    let err = ws.pipeline().await.check_content(&ContentCheckRequest::default()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStructure { fatal: 1, fixable: 0 }));
    assert_eq!(err.category(), ErrorCategory::Schema);
}

#[tokio::test]
async fn invariant_content_check_refuses_fixable_structure() {
    // `a` lacks its leading slash, so `/a` links would not resolve until fixed.
    let ws = Workspace::new("locale: en\n", &common::structure(&["a", "/b"]));
    ws.write_doc("/a", &page("A", ""));
    ws.write_doc("/b", &page("B", "Back to [A](/a)."));
    let pipeline = ws.pipeline().await;

    let err = pipeline.check_content(&ContentCheckRequest::default()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStructure { fatal: 0, fixable } if fixable >= 1));
    assert_eq!(err.category(), ErrorCategory::Schema);
    assert!(err.to_string().contains("--fix"));

    let fixed = pipeline.check_structure(true).await.unwrap();
    assert!(fixed.report.valid);
    let report = pipeline.check_content(&ContentCheckRequest::default()).await.unwrap();
    assert!(report.valid, "{}", report.render());
    assert_eq!(report.stats.broken_links, 0);
}

#[tokio::test]
async fn invariant_missing_icon_then_namespace_fix() {
    let ws = Workspace::new(
        "locale: en\n",
        "project:\n  title: P\n  description: D\ndocuments:\n  - path: /overview\n    title: Overview\n    description: D\n",
    );
    let outcome = ws.pipeline().await.check_structure(false).await.unwrap();
    assert_eq!(outcome.report.errors.fatal.len(), 1);
    assert_eq!(outcome.report.errors.fatal[0].code, ViolationCode::MissingIcon);

    let ws = Workspace::new(
        "locale: en\n",
        "project:\n  title: P\n  description: D\ndocuments:\n  - path: /overview\n    title: Overview\n    description: D\n    icon: foo\n",
    );
    let outcome = ws.pipeline().await.check_structure(true).await.unwrap();
    assert!(outcome.persisted);
    assert_eq!(outcome.fixes_applied.len(), 1);
    assert!(outcome.report.errors.fixable.is_empty());
    assert!(outcome.report.valid);

    let saved = ws.read_structure();
    assert_eq!(saved["documents"][0]["icon"].as_str(), Some("lucide:foo"));
}

#[tokio::test]
async fn invariant_fixed_paths_are_rooted_folders() {
    let ws = Workspace::new(
        "locale: en\n",
        "project:\n  title: P\n  description: D\ndocuments:\n  - path: guide\n    title: Guide\n    description: D\n    icon: book\n    sourcePaths: ['workspace:src/']\n    children:\n      - path: guide/setup\n        title: Setup\n        description: D\n        icon: lucide:cog\n",
    );
    let before = ws.pipeline().await.check_structure(false).await.unwrap();
    let fixable_before = before.report.errors.fixable.len();
    assert!(fixable_before >= 4);

    let after = ws.pipeline().await.check_structure(true).await.unwrap();
    assert!(after.report.errors.fixable.len() < fixable_before);
    assert_eq!(after.report.errors.fatal.len(), before.report.errors.fatal.len());

    let saved = ws.read_structure();
    let top = &saved["documents"][0];
    assert_eq!(top["path"].as_str(), Some("/guide"));
    assert_eq!(top["sourcePaths"][0].as_str(), Some("src/"));
    assert_eq!(top["children"][0]["path"].as_str(), Some("/guide/setup"));
    assert!(top["children"][0].get("icon").is_none());
}

#[tokio::test]
async fn invariant_fix_never_touches_fatal() {
    let ws = Workspace::new(
        "locale: en\n",
        "project:\n  title: P\n  description: D\ndocuments:\n  - path: /a.md\n    title: A\n    description: D\n    icon: lucide:a\n",
    );
    let outcome = ws.pipeline().await.check_structure(true).await.unwrap();
    assert!(!outcome.persisted);
    assert_eq!(outcome.report.errors.count_of(ViolationCode::PathHasFileSuffix), 1);
    assert!(!outcome.report.valid);
}

#[tokio::test]
async fn invariant_ledger_skips_unchanged_source() {
    let ws = Workspace::with_documents(&["/guide"]);
    let pipeline = ws.pipeline().await;
    let ledger = pipeline.ledger();

    let h1 = ledger.commit_source("/guide", &page("Guide", "")).await.unwrap();
    ledger.commit_translation("/guide", "fr", "# Guide\n", &h1).await.unwrap();

    let outcome = pipeline.plan_translations(&plan_request(&["fr"])).await.unwrap();
    let PlanOutcome::Planned { tasks } = outcome else { panic!("expected planned tasks") };
    assert_eq!(tasks.len(), 1);

    // Repeated checks with unchanged content always skip.
    for _ in 0..2 {
        let decision = pipeline.check_task(&tasks[0]).await.unwrap();
        assert_eq!(decision, WorkDecision::Skip(WorkReason::HashUnchanged));
    }

    let h2 = ledger.commit_source("/guide", &page("Guide", "A new paragraph.")).await.unwrap();
    assert_ne!(h1, h2);
    let decision = pipeline.check_task(&tasks[0]).await.unwrap();
    assert_eq!(decision, WorkDecision::Required(WorkReason::HashChanged));

    let forced = pipeline.needs_work(WorkKind::Document, "/guide", "fr", &h1, true).await.unwrap();
    assert_eq!(forced, WorkDecision::Required(WorkReason::Forced));
}

#[tokio::test]
async fn invariant_plan_skips_when_only_source_requested() {
    let ws = Workspace::with_documents(&["/a", "/b"]);
    let outcome = ws.pipeline().await.plan_translations(&plan_request(&["en", "en"])).await.unwrap();
    assert!(matches!(outcome, PlanOutcome::Skipped { .. }));
    assert!(outcome.tasks().is_empty());
}

#[tokio::test]
async fn invariant_plan_unknown_document_is_input_error() {
    let ws = Workspace::with_documents(&["/a"]);
    let request = PlanRequest { documents: Some(vec!["/nope".into()]), ..plan_request(&["fr"]) };
    let err = ws.pipeline().await.plan_translations(&request).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Input);
    assert!(err.to_string().contains("/nope"));
}

#[tokio::test]
async fn invariant_image_plan_honours_shared_assets() {
    let ws = Workspace::with_documents(&["/overview"]);
    ws.write_doc(
        "/overview",
        &page("Overview", "<!-- afs:image id=\"arch\" key=\"system-arch\" desc=\"Architecture\" -->"),
    );
    let pipeline = ws.pipeline().await;

    let outcome = pipeline.plan_images(&plan_request(&["fr", "de"])).await.unwrap();
    assert_eq!(outcome.tasks().len(), 2);
    assert!(outcome.tasks().iter().all(|t| t.key == "system-arch" && t.decision.is_required()));

    pipeline.ledger().mark_shared("system-arch").await.unwrap();
    let outcome = pipeline.plan_images(&plan_request(&["fr"])).await.unwrap();
    assert_eq!(outcome.tasks()[0].decision, WorkDecision::Skip(WorkReason::SharedAsset));
}

#[tokio::test]
async fn invariant_missing_config_is_config_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = docforge_core::DocPipeline::open(dir.path()).await.err().unwrap();
    assert_eq!(err.category(), ErrorCategory::Config);
}

#[test]
fn invariant_canonical_json_deterministic() {
    use serde_json::json;

    let obj1 = json!({"z": 1, "a": 2, "m": {"b": 1, "a": 2}});
    let obj2 = json!({"a": 2, "m": {"a": 2, "b": 1}, "z": 1});

    // Must be identical despite different input ordering
    assert_eq!(canonical_json(&obj1).unwrap(), canonical_json(&obj2).unwrap());
}
