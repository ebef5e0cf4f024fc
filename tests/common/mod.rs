//! Throwaway workspaces for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use docforge_core::metadata::DocumentMetadata;
use docforge_core::DocPipeline;

pub const BODY: &str = "This page walks through the component, its inputs and its outputs in enough detail.";

pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(config: &str, structure: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.yaml"), config).unwrap();
        fs::create_dir_all(dir.path().join("planning")).unwrap();
        fs::write(dir.path().join("planning/document-structure.yaml"), structure).unwrap();
        Self { dir }
    }

    /// English-only workspace over the given top-level paths.
    pub fn with_documents(paths: &[&str]) -> Self {
        Self::new("locale: en\n", &structure(paths))
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Realize a document in the primary locale with a valid sidecar.
    pub fn write_doc(&self, path: &str, content: &str) {
        let folder = self.root().join("docs").join(path.trim_start_matches('/'));
        fs::create_dir_all(&folder).unwrap();
        let meta = serde_yaml::to_string(&DocumentMetadata::new("en")).unwrap();
        fs::write(folder.join(".meta.yaml"), meta).unwrap();
        fs::write(folder.join("en.md"), content).unwrap();
    }

    /// Write a document folder by hand: optional raw sidecar plus the given files.
    pub fn write_raw_doc(&self, path: &str, meta: Option<&str>, files: &[(&str, &str)]) {
        let folder = self.root().join("docs").join(path.trim_start_matches('/'));
        fs::create_dir_all(&folder).unwrap();
        if let Some(meta) = meta {
            fs::write(folder.join(".meta.yaml"), meta).unwrap();
        }
        for (name, content) in files {
            fs::write(folder.join(name), content).unwrap();
        }
    }

    /// Put a regular file where the document folder belongs.
    pub fn write_plain_file_at(&self, path: &str) {
        let docs = self.root().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join(path.trim_start_matches('/')), "not a folder").unwrap();
    }

    pub fn write_asset_image(&self, key: &str, file: &str) {
        let images = self.root().join("assets").join(key).join("images");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join(file), b"\x89PNG").unwrap();
    }

    pub fn read_structure(&self) -> serde_yaml::Value {
        let raw = fs::read_to_string(self.root().join("planning/document-structure.yaml")).unwrap();
        serde_yaml::from_str(&raw).unwrap()
    }

    pub async fn pipeline(&self) -> DocPipeline {
        DocPipeline::open(self.root()).await.unwrap()
    }
}

pub fn structure(paths: &[&str]) -> String {
    let mut out = String::from("project:\n  title: Demo\n  description: Demo documentation\ndocuments:\n");
    for path in paths {
        out.push_str(&format!(
            "  - path: {path}\n    title: Title of {path}\n    description: About {path}\n    sourcePaths: [src/]\n    icon: lucide:file\n"
        ));
    }
    out
}

/// A heading plus enough body text to clear the minimum length.
pub fn page(title: &str, extra: &str) -> String {
    format!("# {title}\n\n{BODY}\n\n{extra}\n")
}
