use serde::{Deserialize, Serialize};

use crate::value::{DocumentPath, FieldValue, MapValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub from_cache: bool,
    pub has_pending_writes: bool,
}

/// A document read at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    pub exists: bool,
    pub fields: MapValue,
    pub metadata: SnapshotMetadata,
}

impl DocumentSnapshot {
    #[must_use]
    pub fn found(path: DocumentPath, fields: MapValue, metadata: SnapshotMetadata) -> Self {
        Self { path, exists: true, fields, metadata }
    }

    #[must_use]
    pub fn missing(path: DocumentPath, metadata: SnapshotMetadata) -> Self {
        Self { path, exists: false, fields: MapValue::new(), metadata }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.path.id()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        crate::query::lookup(&self.fields, field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// One document change within a query event. Indexes are positions in the
/// previous / current result; `-1` when the document was not there.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeType,
    pub document: DocumentSnapshot,
    pub old_index: i64,
    pub new_index: i64,
}

/// Result of a collection read or query, in store order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySnapshot {
    pub documents: Vec<DocumentSnapshot>,
    pub changes: Vec<DocumentChange>,
    pub metadata: SnapshotMetadata,
}

impl QuerySnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Tells apart the first snapshot a listener receives from later changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Initial,
    Change,
    MetadataOnly,
}
