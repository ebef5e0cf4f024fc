//! Validation System - Findings and Triage
//!
//! Checks produce structured violations.
//! Severity decides what blocks: fatal and fixable findings make a result
//! invalid, warnings never do.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Blocks; needs a human decision.
    Fatal,
    /// Blocks until the mechanical correction is applied.
    Fixable,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    // structure
    MissingProjectTitle,
    MissingProjectDescription,
    MissingDocuments,
    MissingTitle,
    MissingDescription,
    MissingPath,
    InvalidPathType,
    PathMissingLeadingSlash,
    PathHasFileSuffix,
    DuplicatePath,
    InvalidSourcePaths,
    LegacySourcePathPrefix,
    MissingIcon,
    IconMissingNamespace,
    UnexpectedIcon,
    InvalidChildren,
    NestingTooDeep,
    // existence
    DocFolderMissing,
    DocPathNotDirectory,
    MissingMeta,
    InvalidMeta,
    MetaFieldMissing,
    InvalidMetaKind,
    SourceLocaleMismatch,
    MissingDefaultLanguageFile,
    MissingSourceLanguageFile,
    MissingTranslationFile,
    // content
    EmptyDocument,
    HeadingLevelSkip,
    LinkHasFileSuffix,
    LinkExceedsRoot,
    BrokenLink,
    ImageNotFoundInSources,
    ImageNotFound,
    RemoteImageUnreachable,
    // slots
    UnreplacedImageSlot,
    MissingSlotImage,
    InvalidImageSlot,
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{self:?}"));
        f.write_str(&code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationViolation {
    #[serde(rename = "type")]
    pub code: ViolationCode,
    pub severity: ViolationSeverity,
    pub location: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Link target, slot id or similar subject of the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
}

impl ValidationViolation {
    pub fn new(
        code: ViolationCode,
        severity: ViolationSeverity,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            location: location.into(),
            message: message.into(),
            suggestion: None,
            target_path: None,
        }
    }

    pub fn fatal(code: ViolationCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ViolationSeverity::Fatal, location, message)
    }

    pub fn fixable(code: ViolationCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ViolationSeverity::Fixable, location, message)
    }

    pub fn warning(code: ViolationCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, ViolationSeverity::Warning, location, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_path = Some(target.into());
        self
    }
}

/// Findings triaged by severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViolationSet {
    pub fatal: Vec<ValidationViolation>,
    pub fixable: Vec<ValidationViolation>,
    pub warnings: Vec<ValidationViolation>,
}

impl ViolationSet {
    pub fn push(&mut self, violation: ValidationViolation) {
        match violation.severity {
            ViolationSeverity::Fatal => self.fatal.push(violation),
            ViolationSeverity::Fixable => self.fixable.push(violation),
            ViolationSeverity::Warning => self.warnings.push(violation),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.fatal.is_empty() && self.fixable.is_empty()
    }

    pub fn total(&self) -> usize {
        self.fatal.len() + self.fixable.len() + self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationViolation> {
        self.fatal.iter().chain(&self.fixable).chain(&self.warnings)
    }

    pub fn count_of(&self, code: ViolationCode) -> usize {
        self.iter().filter(|v| v.code == code).count()
    }
}

impl Extend<ValidationViolation> for ViolationSet {
    fn extend<I: IntoIterator<Item = ValidationViolation>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

/// Multi-section text report: counts, then fatal, fixable and warning findings.
pub fn render_report(title: &str, counts: &[(&str, usize)], set: &ViolationSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("{title}\n{}\n", "=".repeat(title.len())));
    for (label, n) in counts {
        out.push_str(&format!("  {label}: {n}\n"));
    }
    out.push_str(&format!(
        "  fatal: {}  fixable: {}  warnings: {}\n",
        set.fatal.len(),
        set.fixable.len(),
        set.warnings.len()
    ));

    for (heading, list) in [
        ("Fatal", &set.fatal),
        ("Fixable", &set.fixable),
        ("Warnings", &set.warnings),
    ] {
        if list.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{heading}:\n"));
        for v in list {
            out.push_str(&format!("  [{}] {}: {}\n", v.code, v.location, v.message));
            if let Some(s) = &v.suggestion {
                out.push_str(&format!("      -> {s}\n"));
            }
        }
    }

    let verdict = if set.is_valid() { "VALID" } else { "INVALID" };
    out.push_str(&format!("\nResult: {verdict}\n"));
    out
}
