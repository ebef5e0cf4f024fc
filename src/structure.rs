//! Document Structure - the descriptor tree
//!
//! The descriptor is validated as a generic value (see [`crate::schema`])
//! and only turned into the typed, owned tree once it passes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("Structure file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid structure YAML {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Structure does not match the document schema: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("Document `{path}` references unknown parent `{parent}`")]
    UnknownParent { path: String, parent: String },

    #[error("Documents form a parent cycle: {}", .0.join(", "))]
    ParentCycle(Vec<String>),

    #[error("Failed to serialize structure: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectInfo {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub path: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub source_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocumentNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructureDescriptor {
    pub project: ProjectInfo,
    pub documents: Vec<DocumentNode>,
}

impl StructureDescriptor {
    pub fn from_value(value: &Value) -> Result<Self, StructureError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Depth-first walk; top-level nodes have depth 1.
    pub fn walk(&self) -> Vec<(&DocumentNode, usize)> {
        fn visit<'a>(nodes: &'a [DocumentNode], depth: usize, out: &mut Vec<(&'a DocumentNode, usize)>) {
            for node in nodes {
                out.push((node, depth));
                visit(&node.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        visit(&self.documents, 1, &mut out);
        out
    }

    /// The registered path set.
    pub fn all_paths(&self) -> BTreeSet<String> {
        self.walk().into_iter().map(|(n, _)| n.path.clone()).collect()
    }

    /// Paths in tree order.
    pub fn ordered_paths(&self) -> Vec<String> {
        self.walk().into_iter().map(|(n, _)| n.path.clone()).collect()
    }

    pub fn find(&self, path: &str) -> Option<&DocumentNode> {
        self.walk().into_iter().map(|(n, _)| n).find(|n| n.path == path)
    }
}

/// Read the descriptor file as a generic value, assembling legacy flat lists.
pub async fn load_structure_value(path: &Path) -> Result<Value, StructureError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StructureError::NotFound(path.to_path_buf()));
        }
        Err(source) => return Err(StructureError::Io { path: path.to_path_buf(), source }),
    };
    let mut value: Value = serde_yaml::from_str(&raw)
        .map_err(|source| StructureError::Parse { path: path.to_path_buf(), source })?;
    if assemble_flat(&mut value)? {
        tracing::info!(file = %path.display(), "assembled flat document list into a tree");
    }
    Ok(value)
}

pub async fn save_structure_value(path: &Path, value: &Value) -> Result<(), StructureError> {
    let yaml = serde_yaml::to_string(value).map_err(StructureError::Serialize)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StructureError::Io { path: parent.to_path_buf(), source })?;
    }
    tokio::fs::write(path, yaml)
        .await
        .map_err(|source| StructureError::Io { path: path.to_path_buf(), source })
}

/// Nest a flat `documents` list whose entries carry `parentId` (the parent's
/// `path`). Returns whether anything was rearranged.
pub fn assemble_flat(value: &mut Value) -> Result<bool, StructureError> {
    let Some(docs) = value.get_mut("documents").and_then(Value::as_array_mut) else {
        return Ok(false);
    };
    if !docs.iter().any(|d| d.get("parentId").is_some()) {
        return Ok(false);
    }

    let entries: Vec<Value> = std::mem::take(docs);
    let index: HashMap<String, usize> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.get("path").and_then(Value::as_str).map(|p| (p.to_string(), i)))
        .collect();

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
    let mut roots = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        match entry.get("parentId").and_then(Value::as_str) {
            Some(parent) if !parent.is_empty() => {
                let Some(&p) = index.get(parent) else {
                    return Err(StructureError::UnknownParent {
                        path: entry.get("path").and_then(Value::as_str).unwrap_or("?").to_string(),
                        parent: parent.to_string(),
                    });
                };
                children_of[p].push(i);
            }
            _ => roots.push(i),
        }
    }

    fn build(i: usize, entries: &[Value], children_of: &[Vec<usize>], seen: &mut Vec<bool>) -> Value {
        seen[i] = true;
        let mut node = entries[i].clone();
        if let Some(obj) = node.as_object_mut() {
            obj.remove("parentId");
            if !children_of[i].is_empty() {
                let mut kids: Vec<Value> = obj
                    .remove("children")
                    .and_then(|c| c.as_array().cloned())
                    .unwrap_or_default();
                kids.extend(children_of[i].iter().map(|&c| build(c, entries, children_of, seen)));
                obj.insert("children".into(), Value::Array(kids));
            }
        }
        node
    }

    let mut seen = vec![false; entries.len()];
    let tree: Vec<Value> = roots
        .iter()
        .map(|&r| build(r, &entries, &children_of, &mut seen))
        .collect();

    let stranded: Vec<String> = seen
        .iter()
        .enumerate()
        .filter(|(_, s)| !**s)
        .map(|(i, _)| entries[i].get("path").and_then(Value::as_str).unwrap_or("?").to_string())
        .collect();
    if !stranded.is_empty() {
        return Err(StructureError::ParentCycle(stranded));
    }

    *docs = tree;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "project": {"title": "P", "description": "D"},
            "documents": [
                {"path": "/overview", "title": "O", "description": "d", "icon": "lucide:home",
                 "children": [{"path": "/overview/intro", "title": "I", "description": "d"}]},
                {"path": "/api", "title": "A", "description": "d", "icon": "lucide:code"}
            ]
        })
    }

    #[test]
    fn test_typed_tree_walk() {
        let s = StructureDescriptor::from_value(&sample()).unwrap();
        let walked: Vec<_> = s.walk().into_iter().map(|(n, d)| (n.path.as_str(), d)).collect();
        assert_eq!(walked, vec![("/overview", 1), ("/overview/intro", 2), ("/api", 1)]);
        assert!(s.all_paths().contains("/overview/intro"));
        assert_eq!(s.find("/api").map(|n| n.title.as_str()), Some("A"));
    }

    #[test]
    fn test_assemble_flat_list() {
        let mut v = json!({
            "project": {"title": "P", "description": "D"},
            "documents": [
                {"path": "/a", "title": "A", "description": "d"},
                {"path": "/a/b", "title": "B", "description": "d", "parentId": "/a"},
                {"path": "/a/b/c", "title": "C", "description": "d", "parentId": "/a/b"},
                {"path": "/z", "title": "Z", "description": "d", "parentId": null}
            ]
        });
        assert!(assemble_flat(&mut v).unwrap());
        let docs = v["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["children"][0]["path"], "/a/b");
        assert_eq!(docs[0]["children"][0]["children"][0]["path"], "/a/b/c");
        assert!(docs[0]["children"][0].get("parentId").is_none());
    }

    #[test]
    fn test_assemble_unknown_parent() {
        let mut v = json!({"documents": [{"path": "/a", "parentId": "/ghost"}]});
        assert!(matches!(assemble_flat(&mut v), Err(StructureError::UnknownParent { .. })));
    }

    #[test]
    fn test_assemble_cycle() {
        let mut v = json!({"documents": [
            {"path": "/r"},
            {"path": "/a", "parentId": "/b"},
            {"path": "/b", "parentId": "/a"}
        ]});
        assert!(matches!(assemble_flat(&mut v), Err(StructureError::ParentCycle(_))));
    }

    #[test]
    fn test_nested_untouched() {
        let mut v = sample();
        assert!(!assemble_flat(&mut v).unwrap());
        assert_eq!(v, sample());
    }
}
