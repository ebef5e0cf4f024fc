//! DocForge Core - Multilingual Documentation Compiler
//!
//! # The Five Laws (Non-Negotiable)
//! 1. The Primary Locale Is Truth
//! 2. Hashes Decide Staleness
//! 3. Fixes Run Once
//! 4. Content Before Metadata
//! 5. Agents Write, Engine Validates

pub mod config;
pub mod content;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod markdown;
pub mod metadata;
pub mod pipeline;
pub mod planner;
pub mod retry;
pub mod schema;
pub mod slots;
pub mod structure;
pub mod validation;

pub use config::{WorkspaceConfig, WorkspaceLayout};
pub use content::{ContentCheckRequest, ContentReport, ContentStats};
pub use error::{Error, ErrorCategory, Result};
pub use hashing::{canonical_json, content_hash, sha256_hex};
pub use ledger::{Ledger, WorkDecision, WorkKind, WorkReason};
pub use pipeline::DocPipeline;
pub use planner::{ImageTask, PlanOutcome, PlanRequest, TranslationTask};
pub use retry::{retry, RetryOutcome, RetryPolicy};
pub use schema::{StructureOutcome, StructureReport};
pub use structure::{DocumentNode, StructureDescriptor};
pub use validation::{ValidationViolation, ViolationCode, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
