use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::apply_json_options;
use crate::errors::{BridgeError, BridgeResult};
use crate::query::{Query, QueryPipeline};
use crate::snapshot::{PluginResult, SnapshotEvent, SnapshotTranslator};
use crate::store::{DocumentStore, ListenOptions, ListenerRegistration, SnapshotCallback, resolve_document_id};
use crate::value::{DocumentPath, MapValue, ValueCodec, global_options, install_options, normalize_collection_path};

/// Receives every result a listener produces.
pub type ResultCallback = Arc<dyn Fn(PluginResult) + Send + Sync>;

/// Plugin actions over a [`DocumentStore`]. Each call snapshots the
/// process-wide codec options, so one request never mixes prefixes.
#[derive(Clone)]
pub struct Bridge {
    store: Arc<dyn DocumentStore>,
}

impl Bridge {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Reads a collection, optionally through a JSON operation list.
    pub fn collection_get(&self, collection: &str, queries: Option<&Value>) -> PluginResult {
        log::debug!("Getting documents from collection {collection}");
        finish("Error getting collection", self.try_collection_get(collection, queries))
    }

    pub fn doc_get(&self, collection: &str, id: &str) -> PluginResult {
        log::debug!("Getting document {collection}/{id}");
        finish("Error getting document", self.try_doc_get(collection, id))
    }

    /// Writes `data` to `collection/id`. `options` may carry `{"merge": bool}`;
    /// a missing id is generated.
    pub fn doc_set(&self, collection: &str, id: Option<&str>, data: &Value, options: Option<&Value>) -> PluginResult {
        finish("Error writing document", self.try_doc_set(collection, id, data, options))
    }

    pub fn collection_add(&self, collection: &str, data: &Value) -> PluginResult {
        finish("Error adding document", self.try_collection_add(collection, data))
    }

    pub fn doc_delete(&self, collection: &str, id: &str) -> PluginResult {
        finish("Error deleting document", self.try_doc_delete(collection, id))
    }

    /// Subscribes to one document. Every event reaches `callback` as a
    /// realtime envelope with `keep_callback` set.
    ///
    /// # Errors
    /// `InvalidPath` for a bad collection or id, or backend failures.
    pub fn doc_on_snapshot(
        &self,
        collection: &str,
        id: &str,
        options: Option<&Value>,
        callback: ResultCallback,
    ) -> BridgeResult<ListenerRegistration> {
        log::debug!("Listening to document {collection}/{id}");
        let path = document_path(collection, id)?;
        let options = ListenOptions::from_json(options);
        self.store.listen_document(path, options, forward(callback))
    }

    /// Subscribes to a collection, optionally narrowed by a JSON operation list.
    ///
    /// # Errors
    /// `Parse`/`Decode` for a bad operation list, `InvalidPath`, or backend failures.
    pub fn collection_on_snapshot(
        &self,
        collection: &str,
        queries: Option<&Value>,
        options: Option<&Value>,
        callback: ResultCallback,
    ) -> BridgeResult<ListenerRegistration> {
        log::debug!("Listening to collection {collection}");
        let query = build_query(&ValueCodec::global(), collection, queries)?;
        let options = ListenOptions::from_json(options);
        self.store.listen_query(query, options, forward(callback))
    }

    /// Replaces codec options from `{"datePrefix", "referencePrefix", "timestampPrefix",
    /// "geopointPrefix", "dateFormat"}`.
    pub fn set_options(&self, payload: &Value) -> PluginResult {
        finish(
            "Error setting options",
            apply_json_options(global_options(), payload).and_then(install_options).map(|()| PluginResult::ok(Value::Null)),
        )
    }

    fn try_collection_get(&self, collection: &str, queries: Option<&Value>) -> BridgeResult<PluginResult> {
        let codec = ValueCodec::global();
        let query = build_query(&codec, collection, queries)?;
        let snapshot = self.store.run_query(&query)?;
        log::debug!("Successfully got collection {collection} ({} documents)", snapshot.len());
        Ok(SnapshotTranslator::new(codec).translate_query(&snapshot, false))
    }

    fn try_doc_get(&self, collection: &str, id: &str) -> BridgeResult<PluginResult> {
        let path = document_path(collection, id)?;
        let snapshot = self.store.get_document(&path)?;
        Ok(SnapshotTranslator::global().translate_document(&snapshot, false))
    }

    fn try_doc_set(
        &self,
        collection: &str,
        id: Option<&str>,
        data: &Value,
        options: Option<&Value>,
    ) -> BridgeResult<PluginResult> {
        let codec = ValueCodec::global();
        let id = resolve_document_id(id);
        let path = document_path(collection, &id)?;
        let merge = options.and_then(|o| o.get("merge")).and_then(Value::as_bool).unwrap_or(false);
        self.store.set_document(&path, decode_data(&codec, data)?, merge)?;
        log::debug!("Successfully written document {path}");
        Ok(PluginResult::ok(reference_json(&path)))
    }

    fn try_collection_add(&self, collection: &str, data: &Value) -> BridgeResult<PluginResult> {
        let codec = ValueCodec::global();
        let collection = normalize_collection_path(collection)?;
        let path = self.store.add_document(&collection, decode_data(&codec, data)?)?;
        log::debug!("Successfully added document {path}");
        Ok(PluginResult::ok(reference_json(&path)))
    }

    fn try_doc_delete(&self, collection: &str, id: &str) -> BridgeResult<PluginResult> {
        let path = document_path(collection, id)?;
        self.store.delete_document(&path)?;
        log::debug!("Successfully deleted document {path}");
        Ok(PluginResult::ok(Value::Null))
    }
}

fn build_query(codec: &ValueCodec, collection: &str, queries: Option<&Value>) -> BridgeResult<Query> {
    let base = Query::collection(normalize_collection_path(collection)?);
    match queries {
        None | Some(Value::Null) => Ok(base),
        Some(ops) => QueryPipeline::new(codec.clone()).apply(base, ops),
    }
}

fn document_path(collection: &str, id: &str) -> BridgeResult<DocumentPath> {
    DocumentPath::in_collection(&normalize_collection_path(collection)?, id)
}

fn decode_data(codec: &ValueCodec, data: &Value) -> BridgeResult<MapValue> {
    match data {
        Value::Object(map) => codec.decode_map(map),
        other => Err(BridgeError::Parse(format!("document data must be an object, got {other}"))),
    }
}

fn reference_json(path: &DocumentPath) -> Value {
    json!({"id": path.id(), "ref": path.to_string()})
}

/// Wraps a result callback so store events arrive translated.
fn forward(callback: ResultCallback) -> SnapshotCallback {
    Arc::new(move |event: SnapshotEvent| {
        let translator = SnapshotTranslator::global();
        callback(translator.translate_event(&event));
    })
}

fn finish(context: &str, result: BridgeResult<PluginResult>) -> PluginResult {
    match result {
        Ok(r) => r,
        Err(e) => {
            match &e {
                BridgeError::Backend(_) => log::error!("{context}: {e}"),
                _ => log::warn!("{context}: {e}"),
            }
            PluginResult::error(e.to_string())
        }
    }
}
