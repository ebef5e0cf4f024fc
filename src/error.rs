//! Crate-wide error type.
//!
//! Each concern owns its own error enum; `Error` folds them together and
//! maps every failure onto one of the reporting categories.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::planner::PlanError;
use crate::structure::StructureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCategory {
    Schema,
    Content,
    Config,
    Input,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(
        "Document structure has {fatal} fatal and {fixable} fixable error(s); \
         run `check-structure --fix` first"
    )]
    InvalidStructure { fatal: usize, fixable: usize },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Config,
            Error::Structure(_) | Error::InvalidStructure { .. } => ErrorCategory::Schema,
            Error::Ledger(LedgerError::Io { .. }) | Error::Io { .. } => ErrorCategory::Io,
            Error::Ledger(_) => ErrorCategory::Content,
            Error::Plan(_) => ErrorCategory::Input,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
