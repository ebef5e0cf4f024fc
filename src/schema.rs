//! Structure Validation - schema rules and the single-pass fixer
//!
//! CRITICAL: the fixer applies every fixable correction in one deterministic
//! pass, persists, and re-validates exactly once. It never loops and never
//! touches fatal findings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::config::{WorkspaceLayout, CONTENT_SUFFIX};
use crate::structure::{load_structure_value, save_structure_value, StructureError};
use crate::validation::{render_report, ValidationViolation, ViolationCode, ViolationSet};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_PASS_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_pass_count() -> u32 {
    VALIDATION_PASS_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_pass_count() {
    VALIDATION_PASS_COUNT.store(0, Ordering::SeqCst);
}

pub const ICON_NAMESPACE: &str = "lucide";
pub const LEGACY_SOURCE_PREFIX: &str = "workspace:";
pub const MAX_NESTING_DEPTH: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructureSummary {
    pub total_documents: usize,
    pub top_level_documents: usize,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureReport {
    pub valid: bool,
    pub errors: ViolationSet,
    pub summary: StructureSummary,
}

impl StructureReport {
    pub fn render(&self) -> String {
        render_report(
            "Document structure check",
            &[
                ("documents", self.summary.total_documents),
                ("top-level", self.summary.top_level_documents),
                ("max depth", self.summary.max_depth),
            ],
            &self.errors,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedFix {
    pub code: ViolationCode,
    pub location: String,
    pub description: String,
}

/// Outcome of a structure check, with or without the fix pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureOutcome {
    /// Final report (after fixing, when fixes ran).
    pub report: StructureReport,
    pub fixes_applied: Vec<AppliedFix>,
    pub persisted: bool,
}

impl StructureOutcome {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.fixes_applied.is_empty() {
            out.push_str(&format!("Applied {} fix(es):\n", self.fixes_applied.len()));
            for fix in &self.fixes_applied {
                out.push_str(&format!("  [{}] {}: {}\n", fix.code, fix.location, fix.description));
            }
            out.push('\n');
        }
        out.push_str(&self.report.render());
        out
    }
}

/// Validate a descriptor value against the structure schema.
pub fn validate_structure(value: &Value) -> StructureReport {
    #[cfg(feature = "test-hooks")]
    VALIDATION_PASS_COUNT.fetch_add(1, Ordering::SeqCst);

    let mut errors = ViolationSet::default();
    let mut summary = StructureSummary::default();

    let project = value.get("project");
    if non_empty_str(project.and_then(|p| p.get("title"))).is_none() {
        errors.push(ValidationViolation::fatal(
            ViolationCode::MissingProjectTitle,
            "project.title",
            "Project title is required",
        ));
    }
    if non_empty_str(project.and_then(|p| p.get("description"))).is_none() {
        errors.push(ValidationViolation::fatal(
            ViolationCode::MissingProjectDescription,
            "project.description",
            "Project description is required",
        ));
    }

    match value.get("documents").and_then(Value::as_array) {
        Some(docs) if !docs.is_empty() => {
            let mut seen = HashSet::new();
            for (i, node) in docs.iter().enumerate() {
                check_node(node, &format!("documents[{i}]"), 1, &mut seen, &mut errors, &mut summary);
            }
        }
        _ => errors.push(
            ValidationViolation::fatal(
                ViolationCode::MissingDocuments,
                "documents",
                "Structure must contain a non-empty `documents` list",
            )
            .with_suggestion("Add at least one top-level document"),
        ),
    }

    StructureReport { valid: errors.is_valid(), errors, summary }
}

fn check_node(
    node: &Value,
    breadcrumb: &str,
    depth: usize,
    seen: &mut HashSet<String>,
    errors: &mut ViolationSet,
    summary: &mut StructureSummary,
) {
    summary.total_documents += 1;
    if depth == 1 {
        summary.top_level_documents += 1;
    }
    summary.max_depth = summary.max_depth.max(depth);

    let Some(obj) = node.as_object() else {
        errors.push(ValidationViolation::fatal(
            ViolationCode::InvalidChildren,
            breadcrumb,
            "Document entry must be a mapping",
        ));
        return;
    };

    let raw_path = obj.get("path");
    let location = non_empty_str(raw_path).unwrap_or(breadcrumb).to_string();

    if non_empty_str(obj.get("title")).is_none() {
        errors.push(ValidationViolation::fatal(ViolationCode::MissingTitle, &location, "Title is required"));
    }
    if non_empty_str(obj.get("description")).is_none() {
        errors.push(ValidationViolation::fatal(
            ViolationCode::MissingDescription,
            &location,
            "Description is required",
        ));
    }

    match raw_path {
        None | Some(Value::Null) => errors.push(ValidationViolation::fatal(
            ViolationCode::MissingPath,
            &location,
            "Path is required",
        )),
        Some(Value::String(p)) if p.trim().is_empty() => errors.push(ValidationViolation::fatal(
            ViolationCode::MissingPath,
            &location,
            "Path is required",
        )),
        Some(Value::String(p)) => check_path(p, &location, seen, errors),
        Some(_) => errors.push(ValidationViolation::fatal(
            ViolationCode::InvalidPathType,
            &location,
            "Path must be a string",
        )),
    }

    match obj.get("sourcePaths") {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(s) if s.starts_with(LEGACY_SOURCE_PREFIX) => errors.push(
                        ValidationViolation::fixable(
                            ViolationCode::LegacySourcePathPrefix,
                            &location,
                            format!("sourcePaths[{i}] carries the legacy `{LEGACY_SOURCE_PREFIX}` prefix"),
                        )
                        .with_suggestion(format!("Use `{}`", strip_legacy(s))),
                    ),
                    Some(_) => {}
                    None => errors.push(ValidationViolation::fatal(
                        ViolationCode::InvalidSourcePaths,
                        &location,
                        format!("sourcePaths[{i}] must be a string"),
                    )),
                }
            }
        }
        Some(_) => errors.push(ValidationViolation::fatal(
            ViolationCode::InvalidSourcePaths,
            &location,
            "sourcePaths must be a list of strings",
        )),
    }

    let icon = obj.get("icon").filter(|v| !v.is_null());
    if depth == 1 {
        match icon.and_then(Value::as_str).map(str::trim) {
            None | Some("") => errors.push(
                ValidationViolation::fatal(
                    ViolationCode::MissingIcon,
                    &location,
                    "Top-level documents require an icon",
                )
                .with_suggestion(format!("Choose an icon such as `{ICON_NAMESPACE}:book-open`")),
            ),
            Some(i) if !i.contains(':') => errors.push(
                ValidationViolation::fixable(
                    ViolationCode::IconMissingNamespace,
                    &location,
                    format!("Icon `{i}` has no namespace"),
                )
                .with_suggestion(format!("Use `{ICON_NAMESPACE}:{i}`")),
            ),
            Some(_) => {}
        }
    } else if icon.is_some() {
        errors.push(
            ValidationViolation::fixable(
                ViolationCode::UnexpectedIcon,
                &location,
                "Only top-level documents may carry an icon",
            )
            .with_suggestion("Remove the icon"),
        );
    }

    if depth > MAX_NESTING_DEPTH {
        errors.push(ValidationViolation::warning(
            ViolationCode::NestingTooDeep,
            &location,
            format!("Nesting depth {depth} exceeds {MAX_NESTING_DEPTH}"),
        ));
    }

    match obj.get("children") {
        None | Some(Value::Null) => {}
        Some(Value::Array(children)) => {
            for (i, child) in children.iter().enumerate() {
                let crumb = format!("{breadcrumb}.children[{i}]");
                check_node(child, &crumb, depth + 1, seen, errors, summary);
            }
        }
        Some(_) => errors.push(ValidationViolation::fatal(
            ViolationCode::InvalidChildren,
            &location,
            "children must be a list",
        )),
    }
}

fn check_path(path: &str, location: &str, seen: &mut HashSet<String>, errors: &mut ViolationSet) {
    if path.to_ascii_lowercase().ends_with(CONTENT_SUFFIX) {
        errors.push(
            ValidationViolation::fatal(
                ViolationCode::PathHasFileSuffix,
                location,
                format!("Path `{path}` names a file; document paths denote folders"),
            )
            .with_suggestion("Choose the intended folder path without the file suffix"),
        );
    }
    if !path.starts_with('/') {
        errors.push(
            ValidationViolation::fixable(
                ViolationCode::PathMissingLeadingSlash,
                location,
                format!("Path `{path}` must start with `/`"),
            )
            .with_suggestion(format!("Use `/{path}`")),
        );
    }
    if !seen.insert(normalize_path(path)) {
        errors.push(
            ValidationViolation::fatal(
                ViolationCode::DuplicatePath,
                location,
                format!("Path `{path}` is used by more than one document"),
            )
            .with_target(normalize_path(path)),
        );
    }
}

/// Apply every fixable correction in one deterministic pass.
pub fn apply_fixes(value: &mut Value) -> Vec<AppliedFix> {
    let mut applied = Vec::new();
    if let Some(docs) = value.get_mut("documents").and_then(Value::as_array_mut) {
        for node in docs.iter_mut() {
            fix_node(node, 1, &mut applied);
        }
    }
    applied
}

fn fix_node(node: &mut Value, depth: usize, applied: &mut Vec<AppliedFix>) {
    let Some(obj) = node.as_object_mut() else { return };

    if let Some(Value::String(path)) = obj.get_mut("path") {
        if !path.trim().is_empty() && !path.starts_with('/') {
            let fixed = format!("/{path}");
            applied.push(AppliedFix {
                code: ViolationCode::PathMissingLeadingSlash,
                location: fixed.clone(),
                description: format!("`{path}` -> `{fixed}`"),
            });
            *path = fixed;
        }
    }
    let location = obj
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or("<unnamed>")
        .to_string();

    if let Some(Value::Array(items)) = obj.get_mut("sourcePaths") {
        for item in items.iter_mut() {
            if let Value::String(s) = item {
                if s.starts_with(LEGACY_SOURCE_PREFIX) {
                    let fixed = strip_legacy(s).to_string();
                    applied.push(AppliedFix {
                        code: ViolationCode::LegacySourcePathPrefix,
                        location: location.clone(),
                        description: format!("`{s}` -> `{fixed}`"),
                    });
                    *s = fixed;
                }
            }
        }
    }

    if depth == 1 {
        if let Some(Value::String(icon)) = obj.get_mut("icon") {
            let trimmed = icon.trim().to_string();
            if !trimmed.is_empty() && !trimmed.contains(':') {
                let fixed = format!("{ICON_NAMESPACE}:{trimmed}");
                applied.push(AppliedFix {
                    code: ViolationCode::IconMissingNamespace,
                    location: location.clone(),
                    description: format!("`{icon}` -> `{fixed}`"),
                });
                *icon = fixed;
            }
        }
    } else if obj.get("icon").is_some_and(|v| !v.is_null()) {
        obj.remove("icon");
        applied.push(AppliedFix {
            code: ViolationCode::UnexpectedIcon,
            location: location.clone(),
            description: "removed icon from nested document".to_string(),
        });
    }

    if let Some(Value::Array(children)) = obj.get_mut("children") {
        for child in children.iter_mut() {
            fix_node(child, depth + 1, applied);
        }
    }
}

/// Validate the workspace structure file; optionally run the fix pass.
pub async fn check_structure(
    layout: &WorkspaceLayout,
    fix: bool,
) -> Result<(StructureOutcome, Value), StructureError> {
    let mut value = load_structure_value(&layout.structure_file).await?;
    let report = validate_structure(&value);
    tracing::info!(
        fatal = report.errors.fatal.len(),
        fixable = report.errors.fixable.len(),
        warnings = report.errors.warnings.len(),
        "structure validated"
    );

    if !fix || report.errors.fixable.is_empty() {
        let outcome = StructureOutcome { report, fixes_applied: vec![], persisted: false };
        return Ok((outcome, value));
    }

    let fixes_applied = apply_fixes(&mut value);
    save_structure_value(&layout.structure_file, &value).await?;
    let report = validate_structure(&value);
    tracing::info!(
        fixes = fixes_applied.len(),
        remaining_fatal = report.errors.fatal.len(),
        "structure fixed and re-validated"
    );

    Ok((StructureOutcome { report, fixes_applied, persisted: true }, value))
}

fn non_empty_str(v: Option<&Value>) -> Option<&str> {
    v.and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn strip_legacy(s: &str) -> &str {
    s.strip_prefix(LEGACY_SOURCE_PREFIX).unwrap_or(s)
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(path: &str, icon: Option<&str>) -> Value {
        let mut d = json!({"path": path, "title": "T", "description": "D", "sourcePaths": ["src/"]});
        if let Some(i) = icon {
            d["icon"] = json!(i);
        }
        d
    }

    fn structure(docs: Vec<Value>) -> Value {
        json!({"project": {"title": "P", "description": "D"}, "documents": docs})
    }

    #[test]
    fn test_valid_structure() {
        let mut top = doc("/overview", Some("lucide:home"));
        top["children"] = json!([doc("/overview/intro", None)]);
        let report = validate_structure(&structure(vec![top]));
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.summary.total_documents, 2);
        assert_eq!(report.summary.max_depth, 2);
    }

    #[test]
    fn test_missing_icon_is_single_fatal() {
        let report = validate_structure(&structure(vec![doc("/overview", None)]));
        assert_eq!(report.errors.fatal.len(), 1);
        assert_eq!(report.errors.fatal[0].code, ViolationCode::MissingIcon);
        assert!(report.errors.fixable.is_empty());
    }

    #[test]
    fn test_icon_namespace_fixed() {
        let mut v = structure(vec![doc("/overview", Some("foo"))]);
        let before = validate_structure(&v);
        assert_eq!(before.errors.count_of(ViolationCode::IconMissingNamespace), 1);

        let fixes = apply_fixes(&mut v);
        assert_eq!(fixes.len(), 1);
        assert_eq!(v["documents"][0]["icon"], "lucide:foo");
        let after = validate_structure(&v);
        assert!(after.valid);
    }

    #[test]
    fn test_path_suffix_is_fatal_not_fixable() {
        let report = validate_structure(&structure(vec![doc("/guide.md", Some("lucide:a"))]));
        assert_eq!(report.errors.count_of(ViolationCode::PathHasFileSuffix), 1);
        assert!(report.errors.fixable.is_empty());
    }

    #[test]
    fn test_fixable_path_and_legacy_prefix() {
        let mut top = doc("guide", Some("lucide:a"));
        top["sourcePaths"] = json!(["workspace:src/lib.rs", "docs/"]);
        let mut child = doc("/guide/deep", Some("lucide:b"));
        child["children"] = json!([]);
        top["children"] = json!([child]);
        let mut v = structure(vec![top]);

        let before = validate_structure(&v);
        assert_eq!(before.errors.fixable.len(), 3);
        assert!(before.errors.fatal.is_empty());

        apply_fixes(&mut v);
        assert_eq!(v["documents"][0]["path"], "/guide");
        assert_eq!(v["documents"][0]["sourcePaths"][0], "src/lib.rs");
        assert!(v["documents"][0]["children"][0].get("icon").is_none());
        assert!(validate_structure(&v).valid);
    }

    #[test]
    fn test_duplicate_after_normalization() {
        let v = structure(vec![doc("/a", Some("lucide:a")), doc("a", Some("lucide:b"))]);
        let report = validate_structure(&v);
        assert_eq!(report.errors.count_of(ViolationCode::DuplicatePath), 1);
    }

    #[test]
    fn test_deep_nesting_is_warning() {
        let mut d4 = doc("/a/b/c/d", None);
        d4["children"] = json!([]);
        let mut d3 = doc("/a/b/c", None);
        d3["children"] = json!([d4]);
        let mut d2 = doc("/a/b", None);
        d2["children"] = json!([d3]);
        let mut d1 = doc("/a", Some("lucide:a"));
        d1["children"] = json!([d2]);
        let report = validate_structure(&structure(vec![d1]));
        assert!(report.valid);
        assert_eq!(report.errors.warnings.len(), 1);
        assert_eq!(report.summary.max_depth, 4);
    }

    #[test]
    fn test_bad_source_paths_and_top_level() {
        let mut bad = doc("/a", Some("lucide:a"));
        bad["sourcePaths"] = json!("src/");
        let v = json!({"project": {"title": ""}, "documents": [bad]});
        let report = validate_structure(&v);
        assert_eq!(report.errors.count_of(ViolationCode::InvalidSourcePaths), 1);
        assert_eq!(report.errors.count_of(ViolationCode::MissingProjectTitle), 1);
        assert_eq!(report.errors.count_of(ViolationCode::MissingProjectDescription), 1);

        let empty = validate_structure(&json!({"project": {"title": "P", "description": "D"}, "documents": []}));
        assert_eq!(empty.errors.count_of(ViolationCode::MissingDocuments), 1);
    }

    #[test]
    fn test_fixer_leaves_fatal_alone() {
        let mut v = structure(vec![doc("/overview", None), doc("/x.md", Some("lucide:x"))]);
        let fixes = apply_fixes(&mut v);
        assert!(fixes.is_empty());
        assert_eq!(validate_structure(&v).errors.fatal.len(), 2);
    }
}
