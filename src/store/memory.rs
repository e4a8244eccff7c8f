use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use super::{DocumentStore, ListenOptions, ListenerRegistration, SnapshotCallback, new_auto_id};
use crate::errors::{BridgeError, BridgeResult};
use crate::query::{Query, run_query};
use crate::snapshot::{
    ChangeType, DocumentChange, DocumentSnapshot, EventKind, QuerySnapshot, SnapshotEvent, SnapshotMetadata,
};
use crate::value::{DocumentPath, FieldValue, MapValue, ValueCodec, normalize_collection_path};

type Collection = IndexMap<String, MapValue>;

/// In-process document store. Collections keep insertion order, which is the
/// order unordered reads return.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<String, Collection>>,
    metadata: RwLock<SnapshotMetadata>,
    listeners: Mutex<Vec<Listener>>,
    outbox: Mutex<Outbox>,
}

/// Events waiting for delivery, in the order they were computed. Only one
/// caller drains at a time; writes made from inside a callback enqueue behind
/// the events still pending.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<(SnapshotCallback, SnapshotEvent)>,
    draining: bool,
}

/// Clears the draining flag if a callback panics mid-delivery.
struct DrainGuard<'a>(&'a Mutex<Outbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

enum Target {
    Document(DocumentPath),
    Query(Query),
}

enum LastSeen {
    Document(DocumentSnapshot),
    Query { documents: Vec<DocumentSnapshot>, metadata: SnapshotMetadata },
}

struct Listener {
    id: Uuid,
    target: Target,
    options: ListenOptions,
    callback: SnapshotCallback,
    last: LastSeen,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"<collection path>": {"<id>": {fields...}}}`, decoding every
    /// field through `codec`. Returns the number of documents written.
    ///
    /// # Errors
    /// `Parse` for a malformed layout, `InvalidPath` or `Decode` for bad content.
    pub fn load_json(&self, data: &Value, codec: &ValueCodec) -> BridgeResult<usize> {
        let Value::Object(collections) = data else {
            return Err(BridgeError::Parse("store data must be an object of collections".into()));
        };
        let mut count = 0;
        {
            let mut store = self.inner.collections.write();
            for (name, docs) in collections {
                let name = normalize_collection_path(name)?;
                let Value::Object(docs) = docs else {
                    return Err(BridgeError::Parse(format!("collection '{name}' must be an object of documents")));
                };
                let coll = store.entry(name.clone()).or_default();
                for (id, fields) in docs {
                    let Value::Object(fields) = fields else {
                        return Err(BridgeError::Parse(format!("document '{name}/{id}' must be an object")));
                    };
                    DocumentPath::in_collection(&name, id)?;
                    coll.insert(id.clone(), codec.decode_map(fields)?);
                    count += 1;
                }
            }
        }
        log::debug!("loaded {count} documents into memory store");
        self.inner.notify();
        Ok(count)
    }

    /// Replaces the snapshot metadata reported from now on and notifies listeners.
    pub fn set_metadata(&self, metadata: SnapshotMetadata) {
        *self.inner.metadata.write() = metadata;
        self.inner.notify();
    }

    pub fn set_from_cache(&self, from_cache: bool) {
        let mut metadata = *self.inner.metadata.read();
        metadata.from_cache = from_cache;
        self.set_metadata(metadata);
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn register(&self, target: Target, options: ListenOptions, callback: SnapshotCallback) -> ListenerRegistration {
        let id = Uuid::new_v4();
        {
            let mut listeners = self.inner.listeners.lock();
            let metadata = *self.inner.metadata.read();
            let (last, event) = match &target {
                Target::Document(path) => {
                    let snap = self.inner.document(path, metadata);
                    let event = SnapshotEvent::Document { snapshot: snap.clone(), kind: EventKind::Initial };
                    (LastSeen::Document(snap), event)
                }
                Target::Query(query) => {
                    let documents = self.inner.query(query, metadata);
                    let snapshot = QuerySnapshot {
                        changes: diff(&[], &documents),
                        documents: documents.clone(),
                        metadata,
                    };
                    (LastSeen::Query { documents, metadata }, SnapshotEvent::Query { snapshot, kind: EventKind::Initial })
                }
            };
            self.inner.outbox.lock().queue.push_back((callback.clone(), event));
            listeners.push(Listener { id, target, options, callback, last });
        }
        log::debug!("listener {id} registered");
        self.inner.deliver();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        ListenerRegistration::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|l| l.id != id);
                log::debug!("listener {id} removed");
            }
        })
    }
}

impl Inner {
    fn document(&self, path: &DocumentPath, metadata: SnapshotMetadata) -> DocumentSnapshot {
        let store = self.collections.read();
        match store.get(&path.collection_path()).and_then(|c| c.get(path.id())) {
            Some(fields) => DocumentSnapshot::found(path.clone(), fields.clone(), metadata),
            None => DocumentSnapshot::missing(path.clone(), metadata),
        }
    }

    fn query(&self, query: &Query, metadata: SnapshotMetadata) -> Vec<DocumentSnapshot> {
        let docs = {
            let store = self.collections.read();
            store
                .get(&query.collection)
                .map(|coll| {
                    coll.iter()
                        .filter_map(|(id, fields)| {
                            let path = DocumentPath::in_collection(&query.collection, id).ok()?;
                            Some(DocumentSnapshot::found(path, fields.clone(), metadata))
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        run_query(query, docs)
    }

    /// Recomputes every listener's view and queues the events that changed.
    fn notify(&self) {
        let metadata = *self.metadata.read();
        {
            let mut listeners = self.listeners.lock();
            let mut outbox = self.outbox.lock();
            for listener in listeners.iter_mut() {
                if let Some(event) = self.next_event(listener, metadata) {
                    outbox.queue.push_back((listener.callback.clone(), event));
                }
            }
        }
        self.deliver();
    }

    /// Runs queued callbacks in order with no store lock held. A nested call
    /// from inside a callback returns at once and leaves its events to the
    /// outer loop.
    fn deliver(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _guard = DrainGuard(&self.outbox);
        loop {
            let next = {
                let mut outbox = self.outbox.lock();
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            let Some((callback, event)) = next else { break };
            callback(event);
        }
    }

    fn next_event(&self, listener: &mut Listener, metadata: SnapshotMetadata) -> Option<SnapshotEvent> {
        let include_metadata = listener.options.include_metadata_changes;
        match (&listener.target, &mut listener.last) {
            (Target::Document(path), LastSeen::Document(old)) => {
                let snap = self.document(path, metadata);
                let data_changed = old.exists != snap.exists || old.fields != snap.fields;
                let meta_changed = old.metadata != snap.metadata;
                *old = snap.clone();
                let kind = if data_changed {
                    EventKind::Change
                } else if meta_changed && include_metadata {
                    EventKind::MetadataOnly
                } else {
                    return None;
                };
                Some(SnapshotEvent::Document { snapshot: snap, kind })
            }
            (Target::Query(query), LastSeen::Query { documents, metadata: old_meta }) => {
                let current = self.query(query, metadata);
                let changes = diff(documents, &current);
                let meta_changed = *old_meta != metadata;
                *documents = current.clone();
                *old_meta = metadata;
                let kind = if !changes.is_empty() {
                    EventKind::Change
                } else if meta_changed && include_metadata {
                    EventKind::MetadataOnly
                } else {
                    return None;
                };
                Some(SnapshotEvent::Query { snapshot: QuerySnapshot { documents: current, changes, metadata }, kind })
            }
            _ => None,
        }
    }
}

/// Removals first (old positions), then additions and modifications (new positions).
fn diff(old: &[DocumentSnapshot], new: &[DocumentSnapshot]) -> Vec<DocumentChange> {
    let old_pos: HashMap<&str, usize> = old.iter().enumerate().map(|(i, d)| (d.id(), i)).collect();
    let new_pos: HashMap<&str, usize> = new.iter().enumerate().map(|(i, d)| (d.id(), i)).collect();
    let mut changes = Vec::new();
    for (i, d) in old.iter().enumerate() {
        if !new_pos.contains_key(d.id()) {
            changes.push(DocumentChange { kind: ChangeType::Removed, document: d.clone(), old_index: index(i), new_index: -1 });
        }
    }
    for (i, d) in new.iter().enumerate() {
        match old_pos.get(d.id()) {
            None => changes.push(DocumentChange {
                kind: ChangeType::Added,
                document: d.clone(),
                old_index: -1,
                new_index: index(i),
            }),
            Some(&j) if old[j].fields != d.fields => changes.push(DocumentChange {
                kind: ChangeType::Modified,
                document: d.clone(),
                old_index: index(j),
                new_index: index(i),
            }),
            Some(_) => {}
        }
    }
    changes
}

fn index(i: usize) -> i64 {
    i64::try_from(i).unwrap_or(i64::MAX)
}

fn merge_into(target: &mut MapValue, patch: MapValue) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(FieldValue::Map(existing)), FieldValue::Map(inner)) => merge_into(existing, inner),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn get_document(&self, path: &DocumentPath) -> BridgeResult<DocumentSnapshot> {
        let metadata = *self.inner.metadata.read();
        Ok(self.inner.document(path, metadata))
    }

    fn run_query(&self, query: &Query) -> BridgeResult<QuerySnapshot> {
        let mut query = query.clone();
        query.collection = normalize_collection_path(&query.collection)?;
        let metadata = *self.inner.metadata.read();
        let documents = self.inner.query(&query, metadata);
        Ok(QuerySnapshot { documents, changes: Vec::new(), metadata })
    }

    fn set_document(&self, path: &DocumentPath, fields: MapValue, merge: bool) -> BridgeResult<()> {
        {
            let mut store = self.inner.collections.write();
            let coll = store.entry(path.collection_path()).or_default();
            match coll.get_mut(path.id()) {
                Some(existing) if merge => merge_into(existing, fields),
                _ => {
                    coll.insert(path.id().to_owned(), fields);
                }
            }
        }
        log::debug!("set document {path} (merge={merge})");
        self.inner.notify();
        Ok(())
    }

    fn add_document(&self, collection: &str, fields: MapValue) -> BridgeResult<DocumentPath> {
        let collection = normalize_collection_path(collection)?;
        let path = DocumentPath::in_collection(&collection, &new_auto_id())?;
        self.set_document(&path, fields, false)?;
        Ok(path)
    }

    fn delete_document(&self, path: &DocumentPath) -> BridgeResult<()> {
        let removed = {
            let mut store = self.inner.collections.write();
            store.get_mut(&path.collection_path()).and_then(|c| c.shift_remove(path.id())).is_some()
        };
        log::debug!("delete document {path} (existed={removed})");
        if removed {
            self.inner.notify();
        }
        Ok(())
    }

    fn listen_document(
        &self,
        path: DocumentPath,
        options: ListenOptions,
        callback: SnapshotCallback,
    ) -> BridgeResult<ListenerRegistration> {
        Ok(self.register(Target::Document(path), options, callback))
    }

    fn listen_query(
        &self,
        mut query: Query,
        options: ListenOptions,
        callback: SnapshotCallback,
    ) -> BridgeResult<ListenerRegistration> {
        query.collection = normalize_collection_path(&query.collection)?;
        Ok(self.register(Target::Query(query), options, callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Direction, WhereOp};
    use serde_json::json;

    fn store() -> MemoryStore {
        let s = MemoryStore::new();
        s.load_json(
            &json!({"users": {
                "a": {"age": 15}, "b": {"age": 20}, "c": {"age": 25}, "d": {"age": 30}, "e": {"age": 35}
            }}),
            &ValueCodec::default(),
        )
        .unwrap();
        s
    }

    fn collect() -> (SnapshotCallback, Arc<Mutex<Vec<SnapshotEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Arc::new(move |e: SnapshotEvent| sink.lock().push(e)), seen)
    }

    fn ids(snap: &QuerySnapshot) -> Vec<&str> {
        snap.documents.iter().map(DocumentSnapshot::id).collect()
    }

    #[test]
    fn collection_reads_keep_insertion_order() {
        let s = store();
        let snap = s.get_collection("users").unwrap();
        assert_eq!(ids(&snap), vec!["a", "b", "c", "d", "e"]);
        assert!(s.get_collection("nothing").unwrap().is_empty());
        assert!(matches!(s.get_collection("users/a"), Err(BridgeError::InvalidPath(_))));
    }

    #[test]
    fn query_filters_and_limits() {
        let s = store();
        let q = Query::collection("users").where_field("age", WhereOp::Gt, 18.into()).limit(2);
        assert_eq!(ids(&s.run_query(&q).unwrap()), vec!["b", "c"]);
        let q = Query::collection("users").order_by("age", Direction::Desc).limit(1);
        assert_eq!(ids(&s.run_query(&q).unwrap()), vec!["e"]);
    }

    #[test]
    fn set_merge_and_delete() {
        let s = store();
        let path = DocumentPath::parse("users/a").unwrap();
        let mut patch = MapValue::new();
        patch.insert("name".into(), "Al".into());
        s.set_document(&path, patch.clone(), true).unwrap();
        let doc = s.get_document(&path).unwrap();
        assert_eq!(doc.get("age"), Some(&FieldValue::Integer(15)));
        assert_eq!(doc.get("name"), Some(&FieldValue::from("Al")));

        s.set_document(&path, patch, false).unwrap();
        assert!(s.get_document(&path).unwrap().get("age").is_none());

        s.delete_document(&path).unwrap();
        assert!(!s.get_document(&path).unwrap().exists);
    }

    #[test]
    fn add_document_generates_id() {
        let s = MemoryStore::new();
        let path = s.add_document("notes", MapValue::new()).unwrap();
        assert_eq!(path.collection_path(), "notes");
        assert_eq!(path.id().len(), crate::store::AUTO_ID_LEN);
        assert!(s.get_document(&path).unwrap().exists);
    }

    #[test]
    fn write_back_from_a_callback_keeps_other_listeners_current() {
        let s = store();
        let path = DocumentPath::parse("users/a").unwrap();
        let writer = s.clone();
        let target = path.clone();
        let _bumper = s
            .listen_document(
                path.clone(),
                ListenOptions::default(),
                Arc::new(move |e: SnapshotEvent| {
                    if let SnapshotEvent::Document { snapshot, .. } = e
                        && snapshot.get("age") == Some(&FieldValue::Integer(16))
                    {
                        let mut patch = MapValue::new();
                        patch.insert("age".into(), 17.into());
                        writer.set_document(&target, patch, true).unwrap();
                    }
                }),
            )
            .unwrap();
        let (cb, seen) = collect();
        let _watcher = s.listen_document(path.clone(), ListenOptions::default(), cb).unwrap();

        let mut patch = MapValue::new();
        patch.insert("age".into(), 16.into());
        s.set_document(&path, patch, true).unwrap();

        let ages: Vec<Option<FieldValue>> = seen
            .lock()
            .iter()
            .map(|e| match e {
                SnapshotEvent::Document { snapshot, .. } => snapshot.get("age").cloned(),
                SnapshotEvent::Query { .. } => None,
            })
            .collect();
        assert_eq!(ages, vec![Some(FieldValue::Integer(15)), Some(FieldValue::Integer(16)), Some(FieldValue::Integer(17))]);
        assert_eq!(s.get_document(&path).unwrap().get("age"), Some(&FieldValue::Integer(17)));
    }

    #[test]
    fn document_listener_sees_initial_then_changes() {
        let s = store();
        let (cb, seen) = collect();
        let reg = s
            .listen_document(DocumentPath::parse("users/a").unwrap(), ListenOptions::default(), cb)
            .unwrap();
        let mut patch = MapValue::new();
        patch.insert("age".into(), 16.into());
        s.set_document(&DocumentPath::parse("users/a").unwrap(), patch, true).unwrap();
        s.set_document(&DocumentPath::parse("users/b").unwrap(), MapValue::new(), true).unwrap();
        {
            let events = seen.lock();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].kind(), EventKind::Initial);
            assert_eq!(events[1].kind(), EventKind::Change);
        }
        reg.remove();
        assert_eq!(s.listener_count(), 0);
    }

    #[test]
    fn metadata_events_only_when_requested() {
        let s = store();
        let (quiet, quiet_seen) = collect();
        let (loud, loud_seen) = collect();
        let q = Query::collection("users");
        let _a = s.listen_query(q.clone(), ListenOptions::default(), quiet).unwrap();
        let _b = s.listen_query(q, ListenOptions { include_metadata_changes: true }, loud).unwrap();
        s.set_from_cache(true);
        assert_eq!(quiet_seen.lock().len(), 1);
        let loud_events = loud_seen.lock();
        assert_eq!(loud_events.len(), 2);
        assert_eq!(loud_events[1].kind(), EventKind::MetadataOnly);
    }

    #[test]
    fn query_listener_reports_doc_changes() {
        let s = store();
        let (cb, seen) = collect();
        let q = Query::collection("users").where_field("age", WhereOp::Gt, 18.into());
        let _reg = s.listen_query(q, ListenOptions::default(), cb).unwrap();
        s.delete_document(&DocumentPath::parse("users/b").unwrap()).unwrap();
        let events = seen.lock();
        let SnapshotEvent::Query { snapshot, .. } = &events[0] else { panic!("query event expected") };
        assert_eq!(snapshot.changes.len(), 4);
        assert!(snapshot.changes.iter().all(|c| c.kind == ChangeType::Added));
        let SnapshotEvent::Query { snapshot, kind } = &events[1] else { panic!("query event expected") };
        assert_eq!(*kind, EventKind::Change);
        let removed = snapshot.changes.iter().find(|c| c.kind == ChangeType::Removed).unwrap();
        assert_eq!(removed.document.id(), "b");
        assert_eq!(removed.old_index, 0);
        assert_eq!(removed.new_index, -1);
    }
}
