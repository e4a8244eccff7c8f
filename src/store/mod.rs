//! Backend seam: the document store the bridge reads from and subscribes to.
mod auto_id;
mod memory;

pub use auto_id::{AUTO_ID_LEN, new_auto_id, resolve_document_id};
pub use memory::MemoryStore;

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::errors::BridgeResult;
use crate::query::Query;
use crate::snapshot::{DocumentSnapshot, QuerySnapshot, SnapshotEvent};
use crate::value::{DocumentPath, MapValue};

/// Invoked once per realtime event until the registration is removed.
pub type SnapshotCallback = Arc<dyn Fn(SnapshotEvent) + Send + Sync>;

/// Listener options passed through to the subscription unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListenOptions {
    pub include_metadata_changes: bool,
}

impl ListenOptions {
    /// Reads `{"includeMetadataChanges": bool}`. A missing object or key means
    /// `false`; a key of the wrong type is logged and treated as `false`.
    #[must_use]
    pub fn from_json(options: Option<&Value>) -> Self {
        let Some(options) = options.filter(|v| !v.is_null()) else {
            return Self::default();
        };
        match options.get("includeMetadataChanges") {
            None => Self::default(),
            Some(Value::Bool(b)) => Self { include_metadata_changes: *b },
            Some(other) => {
                log::error!("Error getting listen option includeMetadataChanges: {other}");
                Self::default()
            }
        }
    }
}

/// Handle to an active listener. Dropping it keeps the listener alive; call
/// [`ListenerRegistration::remove`] to cancel.
pub struct ListenerRegistration {
    id: Uuid,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration").field("id", &self.id).finish()
    }
}

impl ListenerRegistration {
    pub fn new(id: Uuid, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self { id, cancel: Some(Box::new(cancel)) }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn remove(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

pub trait DocumentStore: Send + Sync {
    /// # Errors
    /// Backend failures, passed through unchanged.
    fn get_document(&self, path: &DocumentPath) -> BridgeResult<DocumentSnapshot>;

    /// # Errors
    /// Backend failures, passed through unchanged.
    fn run_query(&self, query: &Query) -> BridgeResult<QuerySnapshot>;

    /// # Errors
    /// `InvalidPath` for a document path, or backend failures.
    fn get_collection(&self, collection: &str) -> BridgeResult<QuerySnapshot> {
        self.run_query(&Query::collection(collection))
    }

    /// Writes a document; with `merge` the fields are merged into the existing ones.
    ///
    /// # Errors
    /// Backend failures, passed through unchanged.
    fn set_document(&self, path: &DocumentPath, fields: MapValue, merge: bool) -> BridgeResult<()>;

    /// Adds a document under a generated id.
    ///
    /// # Errors
    /// `InvalidPath` for a bad collection path, or backend failures.
    fn add_document(&self, collection: &str, fields: MapValue) -> BridgeResult<DocumentPath>;

    /// # Errors
    /// Backend failures, passed through unchanged.
    fn delete_document(&self, path: &DocumentPath) -> BridgeResult<()>;

    /// # Errors
    /// Backend failures while subscribing.
    fn listen_document(
        &self,
        path: DocumentPath,
        options: ListenOptions,
        callback: SnapshotCallback,
    ) -> BridgeResult<ListenerRegistration>;

    /// # Errors
    /// Backend failures while subscribing.
    fn listen_query(
        &self,
        query: Query,
        options: ListenOptions,
        callback: SnapshotCallback,
    ) -> BridgeResult<ListenerRegistration>;
}
