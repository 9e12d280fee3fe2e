//! `OpenAPI` `$ref` resolver.
//!
//! `openapiv3` models `$ref`s as `ReferenceOr<T>` and leaves resolution to the caller.
//!
//! Supported:
//! - Local refs (`#/components/...`)
//! - File refs relative to the document containing the `$ref` (`./common.yaml#/...`,
//!   `/abs/path/spec.yaml#/...`, `file:///...#/...`)
//!
//! Remote (`http(s)://`) refs are rejected: the document is loaded from the filesystem and no
//! network access happens before the first tool call.

use crate::error::{OpenApiToolsError, Result};
use openapiv3::{OpenAPI, ReferenceOr};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Identity of a document taking part in reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocId {
    /// A document on disk (canonicalized when possible).
    File(PathBuf),
    /// A root document parsed from memory; only local refs resolve against it.
    Inline,
}

impl DocId {
    #[must_use]
    pub fn file(path: &Path) -> Self {
        DocId::File(canonicalize_best_effort(path.to_path_buf()))
    }

    fn display(&self) -> String {
        match self {
            DocId::File(p) => p.display().to_string(),
            DocId::Inline => "<inline>".to_string(),
        }
    }
}

fn canonicalize_best_effort(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

#[derive(Debug)]
pub struct OpenApiResolver {
    root_doc: DocId,
    docs: RwLock<HashMap<DocId, Arc<Value>>>,
}

impl OpenApiResolver {
    /// Create a resolver for a parsed root document.
    ///
    /// # Errors
    ///
    /// Returns an error if the root document cannot be converted into JSON for lookups.
    pub fn new(root_doc: DocId, spec: &OpenAPI) -> Result<Self> {
        let root_value = serde_json::to_value(spec)?;
        let mut docs = HashMap::new();
        docs.insert(root_doc.clone(), Arc::new(root_value));
        Ok(Self {
            root_doc,
            docs: RwLock::new(docs),
        })
    }

    #[must_use]
    pub fn root_doc(&self) -> &DocId {
        &self.root_doc
    }

    /// Follow `$ref`s until an item is reached, returning it with the document it lives in.
    ///
    /// # Errors
    ///
    /// Returns an error on cycles, missing targets, unsupported ref forms, or if a referenced
    /// file cannot be read or parsed.
    pub fn resolve<T>(&self, current_doc: &DocId, r: &ReferenceOr<T>) -> Result<(DocId, T)>
    where
        T: Clone + DeserializeOwned,
    {
        let mut seen: HashSet<(DocId, Option<String>)> = HashSet::new();
        let mut doc = current_doc.clone();
        let mut cur = r.clone();

        loop {
            match cur {
                ReferenceOr::Item(item) => return Ok((doc, item)),
                ReferenceOr::Reference { reference } => {
                    let (target_doc, pointer) = parse_ref(&doc, &reference)?;
                    if !seen.insert((target_doc.clone(), pointer.clone())) {
                        return Err(OpenApiToolsError::OpenApi(format!(
                            "Cyclic $ref detected while resolving: {reference}",
                        )));
                    }

                    let doc_value = self.load_doc(&target_doc)?;
                    let selected = match &pointer {
                        Some(ptr) => doc_value.pointer(ptr).cloned().ok_or_else(|| {
                            OpenApiToolsError::OpenApi(format!(
                                "Unresolved $ref '{reference}' (doc {}, missing pointer '{ptr}')",
                                target_doc.display(),
                            ))
                        })?,
                        None => (*doc_value).clone(),
                    };

                    cur = serde_json::from_value(selected).map_err(|e| {
                        OpenApiToolsError::OpenApi(format!(
                            "$ref '{reference}' (doc {}) does not point at the expected object: {e}",
                            target_doc.display(),
                        ))
                    })?;
                    doc = target_doc;
                }
            }
        }
    }

    fn load_doc(&self, doc: &DocId) -> Result<Arc<Value>> {
        if let Some(v) = self.docs.read().get(doc).cloned() {
            return Ok(v);
        }

        let DocId::File(path) = doc else {
            return Err(OpenApiToolsError::OpenApi(
                "Inline documents can only be resolved from memory".to_string(),
            ));
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            OpenApiToolsError::OpenApi(format!(
                "Failed to read referenced file {}: {e}",
                path.display(),
            ))
        })?;
        // JSON is a YAML subset.
        let parsed: Value = serde_yaml::from_str(&content).map_err(|e| {
            OpenApiToolsError::OpenApi(format!(
                "Failed to parse referenced document {}: {e}",
                path.display(),
            ))
        })?;

        let parsed = Arc::new(parsed);
        self.docs.write().insert(doc.clone(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

fn parse_ref(current_doc: &DocId, reference: &str) -> Result<(DocId, Option<String>)> {
    let (doc_part, fragment) = match reference.split_once('#') {
        Some((d, f)) => (d, Some(f)),
        None => (reference, None),
    };

    let pointer = match fragment {
        None | Some("") => None,
        Some(f) if f.starts_with('/') => Some(f.to_string()),
        Some(_) => {
            return Err(OpenApiToolsError::OpenApi(format!(
                "Unsupported $ref fragment (expected JSON pointer starting with '/'): {reference}",
            )));
        }
    };

    Ok((resolve_doc(current_doc, doc_part)?, pointer))
}

fn resolve_doc(current_doc: &DocId, doc_part: &str) -> Result<DocId> {
    if doc_part.is_empty() {
        return Ok(current_doc.clone());
    }

    if doc_part.starts_with("http://") || doc_part.starts_with("https://") {
        return Err(OpenApiToolsError::OpenApi(format!(
            "Remote $ref '{doc_part}' is not supported",
        )));
    }

    if doc_part.starts_with("file://") {
        let url = Url::parse(doc_part).map_err(|e| {
            OpenApiToolsError::OpenApi(format!("Bad $ref file URL '{doc_part}': {e}"))
        })?;
        let path = url.to_file_path().map_err(|()| {
            OpenApiToolsError::OpenApi(format!("Bad $ref file URL (not a path): {doc_part}"))
        })?;
        return Ok(DocId::File(canonicalize_best_effort(path)));
    }

    let target = Path::new(doc_part);
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        match current_doc {
            DocId::File(base) => base
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(target),
            DocId::Inline => {
                return Err(OpenApiToolsError::OpenApi(format!(
                    "Relative $ref '{doc_part}' cannot be resolved from an inline document",
                )));
            }
        }
    };
    Ok(DocId::File(canonicalize_best_effort(resolved)))
}
