use serde_json::{Map, Value, json};

use super::envelope::{PluginResult, SnapshotEvent};
use super::types::{DocumentChange, DocumentSnapshot, EventKind, QuerySnapshot, SnapshotMetadata};
use crate::value::ValueCodec;

/// Turns snapshots into the JSON envelopes handed back to the caller. Every
/// field value goes through the codec; document order is kept.
#[derive(Debug, Clone, Default)]
pub struct SnapshotTranslator {
    codec: ValueCodec,
}

impl SnapshotTranslator {
    #[must_use]
    pub const fn new(codec: ValueCodec) -> Self {
        Self { codec }
    }

    #[must_use]
    pub fn global() -> Self {
        Self::new(ValueCodec::global())
    }

    /// `{"id", "ref", "exists", "_data"}`; `_data` only for existing documents.
    #[must_use]
    pub fn document_json(&self, snap: &DocumentSnapshot) -> Value {
        let mut out = Map::with_capacity(4);
        out.insert("id".into(), Value::String(snap.id().to_owned()));
        out.insert("ref".into(), Value::String(snap.path.to_string()));
        out.insert("exists".into(), Value::Bool(snap.exists));
        if snap.exists {
            out.insert("_data".into(), Value::Object(self.codec.encode_map(&snap.fields)));
        }
        Value::Object(out)
    }

    #[must_use]
    pub fn translate_document(&self, snap: &DocumentSnapshot, realtime: bool) -> PluginResult {
        let mut message = self.document_json(snap);
        if realtime && let Value::Object(m) = &mut message {
            m.insert("metadata".into(), metadata_json(snap.metadata));
        }
        PluginResult::ok(message).keep_callback(realtime)
    }

    /// A read yields a JSON array of documents; a realtime event yields
    /// `{"docs", "docChanges", "metadata"}`.
    #[must_use]
    pub fn translate_query(&self, snap: &QuerySnapshot, realtime: bool) -> PluginResult {
        let docs: Vec<Value> = snap.documents.iter().map(|d| self.document_json(d)).collect();
        if !realtime {
            return PluginResult::ok(Value::Array(docs));
        }
        let changes: Vec<Value> = snap.changes.iter().map(|c| self.change_json(c)).collect();
        PluginResult::ok(json!({
            "docs": docs,
            "docChanges": changes,
            "metadata": metadata_json(snap.metadata),
        }))
        .keep_callback(true)
    }

    /// Realtime envelope tagged with the event kind under `"event"`.
    #[must_use]
    pub fn translate_event(&self, event: &SnapshotEvent) -> PluginResult {
        let mut result = match event {
            SnapshotEvent::Document { snapshot, .. } => self.translate_document(snapshot, true),
            SnapshotEvent::Query { snapshot, .. } => self.translate_query(snapshot, true),
        };
        if let Value::Object(m) = &mut result.message {
            m.insert("event".into(), Value::String(event_tag(event.kind()).into()));
        }
        crate::dev_trace!(
            "translate",
            json!({"event": event_tag(event.kind()), "bytes": result.message.to_string().len()})
        );
        result
    }

    fn change_json(&self, change: &DocumentChange) -> Value {
        json!({
            "type": change.kind.as_str(),
            "doc": self.document_json(&change.document),
            "oldIndex": change.old_index,
            "newIndex": change.new_index,
        })
    }
}

const fn event_tag(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Initial => "initial",
        EventKind::Change => "change",
        EventKind::MetadataOnly => "metadata",
    }
}

fn metadata_json(m: SnapshotMetadata) -> Value {
    json!({"fromCache": m.from_cache, "hasPendingWrites": m.has_pending_writes})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ChangeType;
    use crate::value::{DocumentPath, FieldValue, MapValue, Timestamp};

    fn snap(id: &str, fields: MapValue) -> DocumentSnapshot {
        DocumentSnapshot::found(
            DocumentPath::in_collection("users", id).unwrap(),
            fields,
            SnapshotMetadata::default(),
        )
    }

    #[test]
    fn document_fields_are_encoded() {
        let mut fields = MapValue::new();
        fields.insert("born".into(), Timestamp::from_millis(5).into());
        fields.insert("friend".into(), DocumentPath::parse("users/bob").unwrap().into());
        let r = SnapshotTranslator::default().translate_document(&snap("al", fields), false);
        assert!(r.is_ok());
        assert!(!r.keep_callback);
        assert_eq!(
            r.message,
            json!({"id": "al", "ref": "users/al", "exists": true,
                   "_data": {"born": "__DATE:5", "friend": "__REFERENCE:users/bob"}})
        );
    }

    #[test]
    fn missing_document_has_no_data() {
        let s = DocumentSnapshot::missing(DocumentPath::parse("users/x").unwrap(), SnapshotMetadata::default());
        let r = SnapshotTranslator::default().translate_document(&s, false);
        assert_eq!(r.message, json!({"id": "x", "ref": "users/x", "exists": false}));
    }

    #[test]
    fn query_read_is_an_ordered_array() {
        let mut q = QuerySnapshot::default();
        for id in ["z", "a", "m"] {
            q.documents.push(snap(id, MapValue::new()));
        }
        let r = SnapshotTranslator::default().translate_query(&q, false);
        let ids: Vec<&str> = r.message.as_array().unwrap().iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn realtime_query_event_carries_changes_and_tag() {
        let mut fields = MapValue::new();
        fields.insert("n".into(), FieldValue::Integer(1));
        let d = snap("a", fields);
        let q = QuerySnapshot {
            documents: vec![d.clone()],
            changes: vec![DocumentChange { kind: ChangeType::Added, document: d, old_index: -1, new_index: 0 }],
            metadata: SnapshotMetadata { from_cache: true, has_pending_writes: false },
        };
        let r = SnapshotTranslator::default()
            .translate_event(&SnapshotEvent::Query { snapshot: q, kind: EventKind::Initial });
        assert!(r.keep_callback);
        assert_eq!(r.message["event"], "initial");
        assert_eq!(r.message["docChanges"][0]["type"], "added");
        assert_eq!(r.message["docChanges"][0]["newIndex"], 0);
        assert_eq!(r.message["metadata"]["fromCache"], true);
    }
}
