//! Workspace configuration.
//!
//! `config.yaml` is read exactly once at startup and turned into a
//! [`WorkspaceLayout`], which every component receives explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ENGINE_VERSION;

pub const CONFIG_FILE: &str = "config.yaml";
pub const META_FILE: &str = ".meta.yaml";
pub const CONTENT_SUFFIX: &str = ".md";

const DEFAULT_DOCS_DIR: &str = "docs";
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_STRUCTURE_FILE: &str = "planning/document-structure.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Workspace configuration not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid workspace configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Primary locale (`locale`) is not set in {0}")]
    MissingLocale(PathBuf),

    #[error("Invalid minEngineVersion `{0}`")]
    InvalidVersion(String),

    #[error("Workspace requires engine >= {required}, current is {current}")]
    EngineTooOld { required: String, current: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk shape of `config.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub translate_languages: Vec<String>,
    #[serde(default = "default_sources")]
    pub sources_path: Vec<PathBuf>,
    #[serde(default)]
    pub docs_dir: Option<PathBuf>,
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
    #[serde(default)]
    pub structure_file: Option<PathBuf>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub min_engine_version: Option<String>,
}

fn default_sources() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_concurrency() -> usize {
    8
}

/// Resolved workspace paths and settings.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub primary_locale: String,
    pub translate_languages: Vec<String>,
    pub source_roots: Vec<PathBuf>,
    pub docs_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub structure_file: PathBuf,
    pub probe_timeout: Duration,
    pub concurrency: usize,
}

impl WorkspaceLayout {
    /// Load `config.yaml` from the workspace root.
    pub async fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path));
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let config: WorkspaceConfig = serde_yaml::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        Self::from_config(root, config)
    }

    pub fn from_config(root: &Path, config: WorkspaceConfig) -> Result<Self, ConfigError> {
        let primary_locale = config
            .locale
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ConfigError::MissingLocale(root.join(CONFIG_FILE)))?;

        if let Some(required) = &config.min_engine_version {
            check_engine_version(required)?;
        }

        let resolve = |p: PathBuf| {
            if p.is_absolute() {
                p
            } else {
                root.join(p)
            }
        };

        let mut translate_languages: Vec<String> = Vec::new();
        for lang in config.translate_languages {
            let lang = lang.trim().to_string();
            if !lang.is_empty() && !translate_languages.contains(&lang) {
                translate_languages.push(lang);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            primary_locale,
            translate_languages,
            source_roots: config.sources_path.into_iter().map(resolve).collect(),
            docs_dir: resolve(config.docs_dir.unwrap_or_else(|| DEFAULT_DOCS_DIR.into())),
            assets_dir: resolve(config.assets_dir.unwrap_or_else(|| DEFAULT_ASSETS_DIR.into())),
            structure_file: resolve(
                config.structure_file.unwrap_or_else(|| DEFAULT_STRUCTURE_FILE.into()),
            ),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            concurrency: config.concurrency.max(1),
        })
    }

    /// Folder holding a document's realized locales, e.g. `docs/guides/setup`.
    pub fn doc_dir(&self, doc_path: &str) -> PathBuf {
        self.docs_dir.join(doc_path.trim_start_matches('/'))
    }

    pub fn doc_meta_path(&self, doc_path: &str) -> PathBuf {
        self.doc_dir(doc_path).join(META_FILE)
    }

    pub fn doc_content_path(&self, doc_path: &str, locale: &str) -> PathBuf {
        self.doc_dir(doc_path).join(format!("{locale}{CONTENT_SUFFIX}"))
    }

    pub fn asset_dir(&self, key: &str) -> PathBuf {
        self.assets_dir.join(key)
    }

    pub fn asset_meta_path(&self, key: &str) -> PathBuf {
        self.asset_dir(key).join(META_FILE)
    }

    pub fn asset_images_dir(&self, key: &str) -> PathBuf {
        self.asset_dir(key).join("images")
    }

    /// Locales every document must realize: default, source, then configured targets.
    pub fn required_locales(&self) -> Vec<String> {
        let mut locales = vec![self.primary_locale.clone()];
        for lang in &self.translate_languages {
            if !locales.contains(lang) {
                locales.push(lang.clone());
            }
        }
        locales
    }
}

fn check_engine_version(required: &str) -> Result<(), ConfigError> {
    let min = semver::Version::parse(required)
        .map_err(|_| ConfigError::InvalidVersion(required.to_string()))?;
    let current = semver::Version::parse(ENGINE_VERSION)
        .map_err(|_| ConfigError::InvalidVersion(ENGINE_VERSION.to_string()))?;
    if current < min {
        return Err(ConfigError::EngineTooOld {
            required: required.to_string(),
            current: ENGINE_VERSION.to_string(),
        });
    }
    Ok(())
}
