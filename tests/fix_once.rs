//! The fixer re-validates exactly once.
//!
//! Kept in its own test binary so no other test touches the pass counter.

#![cfg(feature = "test-hooks")]

mod common;

use common::Workspace;
use docforge_core::schema::{get_validation_pass_count, reset_validation_pass_count};

#[tokio::test]
async fn fix_pass_validates_twice_total() {
    let ws = Workspace::new(
        "locale: en\n",
        "project:\n  title: P\n  description: D\ndocuments:\n  - path: intro\n    title: Intro\n    description: D\n    icon: home\n",
    );
    let pipeline = ws.pipeline().await;

    reset_validation_pass_count();
    let outcome = pipeline.check_structure(true).await.unwrap();
    assert_eq!(outcome.fixes_applied.len(), 2);
    assert!(outcome.report.valid);
    assert_eq!(get_validation_pass_count(), 2);

    // Nothing left to fix: a single pass.
    reset_validation_pass_count();
    let outcome = pipeline.check_structure(true).await.unwrap();
    assert!(outcome.fixes_applied.is_empty());
    assert!(!outcome.persisted);
    assert_eq!(get_validation_pass_count(), 1);
}
