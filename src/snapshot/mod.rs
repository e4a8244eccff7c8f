//! Snapshot model and its translation into JSON envelopes.
mod envelope;
mod translate;
mod types;

pub use envelope::{PluginResult, SnapshotEvent, Status};
pub use translate::SnapshotTranslator;
pub use types::{
    ChangeType, DocumentChange, DocumentSnapshot, EventKind, QuerySnapshot, SnapshotMetadata,
};
