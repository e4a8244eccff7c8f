use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{BridgeError, BridgeResult};

/// Slash-separated path of a document: `collection/doc[/collection/doc...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// # Errors
    /// Returns `InvalidPath` for empty segments or a path that names a collection.
    pub fn parse(path: &str) -> BridgeResult<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(BridgeError::InvalidPath(format!("not a document path: {path}")));
        }
        Ok(Self { segments })
    }

    /// # Errors
    /// Returns `InvalidPath` if `collection` is not a collection path or `id` is empty.
    pub fn in_collection(collection: &str, id: &str) -> BridgeResult<Self> {
        let mut segments = split_segments(collection)?;
        if segments.len() % 2 == 0 {
            return Err(BridgeError::InvalidPath(format!("not a collection path: {collection}")));
        }
        if id.is_empty() || id.contains('/') {
            return Err(BridgeError::InvalidPath(format!("invalid document id: {id:?}")));
        }
        segments.push(id.to_owned());
        Ok(Self { segments })
    }

    /// Last path segment.
    #[must_use]
    pub fn id(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Path of the collection containing this document.
    #[must_use]
    pub fn collection_path(&self) -> String {
        self.segments[..self.segments.len().saturating_sub(1)].join("/")
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Normalizes a collection path, rejecting document paths.
///
/// # Errors
/// Returns `InvalidPath` for empty segments or an even segment count.
pub fn normalize_collection_path(path: &str) -> BridgeResult<String> {
    let segments = split_segments(path)?;
    if segments.len() % 2 == 0 {
        return Err(BridgeError::InvalidPath(format!("not a collection path: {path}")));
    }
    Ok(segments.join("/"))
}

fn split_segments(path: &str) -> BridgeResult<Vec<String>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidPath("empty path".into()));
    }
    let segments: Vec<String> = trimmed.split('/').map(str::to_owned).collect();
    if segments.iter().any(String::is_empty) {
        return Err(BridgeError::InvalidPath(format!("empty segment in {path:?}")));
    }
    Ok(segments)
}
