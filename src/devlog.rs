//! Structured trace records for query planning, execution and translation.
//!
//! Each record is one JSON object `{"trace": <kind>, ...fields}` logged at
//! `Trace` level on [`DEV_TARGET`]. A thread may also capture its own records
//! with [`capture`], which is how tests inspect them.

use std::cell::RefCell;

use serde_json::{Map, Value};

/// Log target for trace records; `logger` can route it to its own file.
pub const DEV_TARGET: &str = "docbridge::dev";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<Value>>> = const { RefCell::new(None) };
}

/// Stops capturing on this thread when dropped.
pub struct Capture(());

impl Drop for Capture {
    fn drop(&mut self) {
        CAPTURED.with(|c| c.borrow_mut().take());
    }
}

/// Starts capturing trace records emitted on the current thread.
#[must_use]
pub fn capture() -> Capture {
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    Capture(())
}

/// Records captured so far on this thread; the buffer is emptied.
pub fn take_captured() -> Vec<Value> {
    CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// True when a record would go anywhere.
#[must_use]
pub fn enabled() -> bool {
    log::log_enabled!(target: DEV_TARGET, log::Level::Trace)
        || CAPTURED.with(|c| c.borrow().is_some())
}

/// `{"trace": kind}` followed by the entries of `fields`. A non-object
/// `fields` lands under `"value"`.
#[must_use]
pub fn build_record(kind: &str, fields: Value) -> Value {
    let mut record = Map::new();
    record.insert("trace".to_owned(), Value::from(kind));
    match fields {
        Value::Object(m) => record.extend(m),
        Value::Null => {}
        other => {
            record.insert("value".to_owned(), other);
        }
    }
    Value::Object(record)
}

pub fn emit(kind: &str, fields: Value) {
    let record = build_record(kind, fields);
    log::trace!(target: DEV_TARGET, "{record}");
    CAPTURED.with(|c| {
        if let Some(buf) = c.borrow_mut().as_mut() {
            buf.push(record);
        }
    });
}

/// `dev_trace!("kind", json!({...}))`. The fields expression is only
/// evaluated when [`enabled`] says the record has somewhere to go.
#[macro_export]
macro_rules! dev_trace {
    ($kind:expr, $fields:expr $(,)?) => {
        if $crate::devlog::enabled() {
            $crate::devlog::emit($kind, $fields);
        }
    };
}
