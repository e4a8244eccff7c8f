use std::sync::Arc;

use docbridge::query::Query;
use docbridge::snapshot::{DocumentSnapshot, QuerySnapshot, Status};
use docbridge::store::{DocumentStore, ListenOptions, ListenerRegistration, MemoryStore, SnapshotCallback};
use docbridge::value::{DocumentPath, MapValue, ValueCodec};
use docbridge::{Bridge, BridgeError, BridgeResult, Dispatcher, PluginResult};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Store whose every call fails the way a remote backend would.
struct Unavailable;

fn down<T>() -> BridgeResult<T> {
    Err(BridgeError::Backend("UNAVAILABLE: backend offline".into()))
}

impl DocumentStore for Unavailable {
    fn get_document(&self, _: &DocumentPath) -> BridgeResult<DocumentSnapshot> {
        down()
    }
    fn run_query(&self, _: &Query) -> BridgeResult<QuerySnapshot> {
        down()
    }
    fn set_document(&self, _: &DocumentPath, _: MapValue, _: bool) -> BridgeResult<()> {
        down()
    }
    fn add_document(&self, _: &str, _: MapValue) -> BridgeResult<DocumentPath> {
        down()
    }
    fn delete_document(&self, _: &DocumentPath) -> BridgeResult<()> {
        down()
    }
    fn listen_document(&self, _: DocumentPath, _: ListenOptions, _: SnapshotCallback) -> BridgeResult<ListenerRegistration> {
        down()
    }
    fn listen_query(&self, _: Query, _: ListenOptions, _: SnapshotCallback) -> BridgeResult<ListenerRegistration> {
        down()
    }
}

fn people_bridge() -> Bridge {
    let store = MemoryStore::new();
    store
        .load_json(
            &json!({"people": {
                "p1": {"age": 15}, "p2": {"age": 20}, "p3": {"age": 25}, "p4": {"age": 30}, "p5": {"age": 35}
            }}),
            &ValueCodec::default(),
        )
        .unwrap();
    Bridge::new(Arc::new(store))
}

#[tokio::test]
async fn dispatched_query_returns_two_adults_in_store_order() {
    let bridge = people_bridge();
    let dispatcher = Dispatcher::current().unwrap();
    let ops = json!([
        {"queryType": "where", "value": {"field": "age", "operator": ">", "value": 18}},
        {"queryType": "limit", "value": 2}
    ]);
    let r = dispatcher.execute(move || bridge.collection_get("people", Some(&ops))).await;
    assert!(r.is_ok());
    let docs = r.message.as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["_data"]["age"], 20);
    assert_eq!(docs[1]["_data"]["age"], 25);
}

#[tokio::test]
async fn submit_delivers_through_callback() {
    let bridge = people_bridge();
    let dispatcher = Dispatcher::current().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<PluginResult>();
    dispatcher
        .submit(move || bridge.doc_get("people", "p3"), move |r| {
            let _ = tx.send(r);
        })
        .await
        .unwrap();
    let r = rx.await.unwrap();
    assert_eq!(r.message["id"], "p3");
    assert_eq!(r.message["exists"], true);
}

#[test]
fn backend_errors_pass_through_unchanged() {
    let bridge = Bridge::new(Arc::new(Unavailable));
    let r = bridge.collection_get("people", None);
    assert_eq!(r.status, Status::Error);
    assert_eq!(r.message, Value::String("Backend error: UNAVAILABLE: backend offline".into()));
    let err = bridge
        .doc_on_snapshot("people", "p1", None, Arc::new(|_: PluginResult| {}))
        .unwrap_err();
    assert!(matches!(err, BridgeError::Backend(m) if m.starts_with("UNAVAILABLE")));
}

#[test]
fn collection_add_and_delete_round_trip() {
    let bridge = people_bridge();
    let added = bridge.collection_add("people", &json!({"age": 50, "born": "__DATE:0"}));
    assert!(added.is_ok());
    let id = added.message["id"].as_str().unwrap().to_owned();
    assert_eq!(id.len(), 20);
    let got = bridge.doc_get("people", &id);
    assert_eq!(got.message["_data"]["born"], "__DATE:0");
    assert!(bridge.doc_delete("people", &id).is_ok());
    assert_eq!(bridge.doc_get("people", &id).message["exists"], false);
}

#[test]
fn collection_listener_with_operations() {
    let bridge = people_bridge();
    let seen = Arc::new(Mutex::new(Vec::<PluginResult>::new()));
    let sink = seen.clone();
    let ops = json!([{"queryType": "where", "value": {"field": "age", "operator": ">=", "value": 30}}]);
    let reg = bridge
        .collection_on_snapshot("people", Some(&ops), None, Arc::new(move |r: PluginResult| sink.lock().push(r)))
        .unwrap();
    bridge.doc_set("people", Some("p1"), &json!({"age": 31}), None);
    bridge.doc_set("people", Some("p2"), &json!({"age": 21}), None);
    reg.remove();
    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].message["docs"].as_array().unwrap().len(), 2);
    assert_eq!(seen[1].message["docChanges"][0]["type"], "added");
    assert_eq!(seen[1].message["docChanges"][0]["doc"]["id"], "p1");
}

#[test]
fn doc_operations_reject_bad_paths() {
    let bridge = people_bridge();
    let r = bridge.doc_get("people/p1", "x");
    assert!(r.message.as_str().unwrap().starts_with("Invalid path"));
    let r = bridge.doc_set("people", Some("x"), &json!([1]), None);
    assert!(r.message.as_str().unwrap().starts_with("Parse error"));
}
