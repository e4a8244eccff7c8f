use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{DocumentSnapshot, EventKind, QuerySnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// What the calling environment receives for one request or listener event.
///
/// `keep_callback` asks the caller to keep the callback alive for further
/// results; realtime listeners set it, single reads do not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResult {
    pub status: Status,
    pub message: Value,
    pub keep_callback: bool,
}

impl PluginResult {
    #[must_use]
    pub const fn ok(message: Value) -> Self {
        Self { status: Status::Ok, message, keep_callback: false }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self { status: Status::Error, message: Value::String(message.into()), keep_callback: false }
    }

    #[must_use]
    pub const fn keep_callback(mut self, keep: bool) -> Self {
        self.keep_callback = keep;
        self
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// A value handed to a realtime listener.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    Document { snapshot: DocumentSnapshot, kind: EventKind },
    Query { snapshot: QuerySnapshot, kind: EventKind },
}

impl SnapshotEvent {
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Document { kind, .. } | Self::Query { kind, .. } => *kind,
        }
    }
}
