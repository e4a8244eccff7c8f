use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::eval::lookup;
use super::pipeline::OrderByFields;
use super::types::{Direction, FieldFilter, MAX_IN_SET, OrderBy, Query, WhereOp};
use crate::errors::{BridgeError, BridgeResult};
use crate::value::{FieldValue, MapValue, ValueCodec};

const SNAPSHOT_DATA_KEY: &str = "_data";
const SNAPSHOT_EXISTS_KEY: &str = "exists";
const ENVELOPE_KEYS: [&str; 4] = ["id", "ref", SNAPSHOT_EXISTS_KEY, SNAPSHOT_DATA_KEY];

/// Wire form of one operation: `{"queryType": ..., "value": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(rename = "queryType")]
    pub query_type: String,
    #[serde(default)]
    pub value: Value,
}

/// Cursor argument: a document snapshot or a list of raw values.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorArg {
    Snapshot(SnapshotArg),
    Values(Vec<FieldValue>),
}

/// A document snapshot passed as a cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotArg {
    pub exists: bool,
    pub fields: MapValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    Limit(usize),
    Where(FieldFilter),
    OrderBy(OrderBy),
    StartAfter(CursorArg),
    StartAt(CursorArg),
    EndAt(CursorArg),
    EndBefore(CursorArg),
}

/// Result of parsing one operation; unknown types are kept so the pipeline
/// can report them.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOperation {
    Known(QueryOperation),
    Unknown(String),
}

impl QueryOperation {
    /// # Errors
    /// `Parse` when the value does not fit the operation type, `Decode` when a
    /// wrapped value inside it is malformed.
    pub fn parse(raw: &RawOperation, codec: &ValueCodec) -> BridgeResult<ParsedOperation> {
        let op = match raw.query_type.as_str() {
            "limit" => Self::Limit(parse_limit(&raw.value)?),
            "where" => Self::Where(parse_where(&raw.value, codec)?),
            "orderBy" => Self::OrderBy(parse_order_by(&raw.value)?),
            "startAfter" => Self::StartAfter(CursorArg::parse(&raw.value, codec)?),
            "startAt" => Self::StartAt(CursorArg::parse(&raw.value, codec)?),
            "endAt" => Self::EndAt(CursorArg::parse(&raw.value, codec)?),
            "endBefore" => Self::EndBefore(CursorArg::parse(&raw.value, codec)?),
            other => return Ok(ParsedOperation::Unknown(other.to_owned())),
        };
        Ok(ParsedOperation::Known(op))
    }

    #[must_use]
    pub const fn query_type(&self) -> &'static str {
        match self {
            Self::Limit(_) => "limit",
            Self::Where(_) => "where",
            Self::OrderBy(_) => "orderBy",
            Self::StartAfter(_) => "startAfter",
            Self::StartAt(_) => "startAt",
            Self::EndAt(_) => "endAt",
            Self::EndBefore(_) => "endBefore",
        }
    }

    /// Applies this operation to `query`. Cursor operations align snapshot
    /// arguments against `order_by`.
    #[must_use]
    pub fn apply(&self, query: Query, order_by: &OrderByFields) -> Query {
        match self {
            Self::Limit(n) => query.limit(*n),
            Self::Where(f) => query.where_field(f.field.clone(), f.op, f.value.clone()),
            Self::OrderBy(o) => query.order_by(o.field.clone(), o.direction),
            Self::StartAfter(c) => query.start_after(c.resolve(order_by)),
            Self::StartAt(c) => query.start_at(c.resolve(order_by)),
            Self::EndAt(c) => query.end_at(c.resolve(order_by)),
            Self::EndBefore(c) => query.end_before(c.resolve(order_by)),
        }
    }
}

impl CursorArg {
    /// Arrays are value lists, objects are snapshots, any other value is a
    /// single-element value list.
    ///
    /// # Errors
    /// Returns `Decode` for malformed wrapped values.
    pub fn parse(value: &Value, codec: &ValueCodec) -> BridgeResult<Self> {
        match value {
            Value::Array(items) => Ok(Self::Values(
                items.iter().map(|v| codec.decode(v)).collect::<BridgeResult<_>>()?,
            )),
            Value::Object(obj) => SnapshotArg::parse(obj, codec).map(Self::Snapshot),
            Value::Null => Err(BridgeError::Parse("cursor operation requires a value".into())),
            scalar => Ok(Self::Values(vec![codec.decode(scalar)?])),
        }
    }

    /// Positional cursor values.
    ///
    /// An existing snapshot with collected order-by fields yields one value per
    /// order-by field, in order-by order, skipping fields the snapshot lacks.
    /// Otherwise every snapshot field value is used in insertion order. Value
    /// lists pass through unchanged.
    #[must_use]
    pub fn resolve(&self, order_by: &OrderByFields) -> Vec<FieldValue> {
        match self {
            Self::Values(values) => values.clone(),
            Self::Snapshot(snap) if snap.exists && !order_by.is_empty() => order_by
                .iter()
                .filter_map(|field| lookup(&snap.fields, field).cloned())
                .collect(),
            Self::Snapshot(snap) => snap.fields.values().cloned().collect(),
        }
    }
}

impl SnapshotArg {
    /// Accepts the serialized client snapshot `{"_data": {"exists", "_data": {...}}}`,
    /// its inner form `{"exists", "_data": {...}}`, or a bare field map, which is
    /// taken as an existing document.
    ///
    /// A map is only read as an envelope when `exists` is a boolean and every
    /// other key is `id`, `ref` or an object-valued `_data`, so documents with
    /// their own `exists` field stay bare. A bare document holding nothing but
    /// a boolean `exists` is indistinguishable from an envelope.
    ///
    /// # Errors
    /// Returns `Decode` for malformed wrapped values among the fields.
    pub fn parse(obj: &Map<String, Value>, codec: &ValueCodec) -> BridgeResult<Self> {
        let envelope = match obj.get(SNAPSHOT_DATA_KEY) {
            Some(Value::Object(inner)) if is_envelope(inner) => Some(inner),
            _ if is_envelope(obj) => Some(obj),
            _ => None,
        };
        let Some(envelope) = envelope else {
            return Ok(Self { exists: true, fields: codec.decode_map(obj)? });
        };
        let exists = envelope.get(SNAPSHOT_EXISTS_KEY).and_then(Value::as_bool) == Some(true);
        let fields = match envelope.get(SNAPSHOT_DATA_KEY) {
            Some(Value::Object(data)) => codec.decode_map(data)?,
            _ => MapValue::new(),
        };
        Ok(Self { exists, fields })
    }
}

fn is_envelope(m: &Map<String, Value>) -> bool {
    m.get(SNAPSHOT_EXISTS_KEY).is_some_and(Value::is_boolean)
        && m.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str()))
        && m.get(SNAPSHOT_DATA_KEY).is_none_or(Value::is_object)
}

fn parse_limit(value: &Value) -> BridgeResult<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| BridgeError::Parse(format!("limit requires a non-negative integer, got {value}")))
}

fn required_str<'a>(obj: &'a Map<String, Value>, key: &str, op: &str) -> BridgeResult<&'a str> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
        Some(other) => Err(BridgeError::Parse(format!("{op}.{key} must be a non-empty string, got {other}"))),
        None => Err(BridgeError::Parse(format!("{op} is missing {key}"))),
    }
}

fn as_object<'a>(value: &'a Value, op: &str) -> BridgeResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| BridgeError::Parse(format!("{op} requires an object value, got {value}")))
}

fn parse_where(value: &Value, codec: &ValueCodec) -> BridgeResult<FieldFilter> {
    let obj = as_object(value, "where")?;
    let field = required_str(obj, "field", "where")?.to_owned();
    let op: WhereOp = required_str(obj, "operator", "where")?.parse()?;
    let operand = obj
        .get("value")
        .ok_or_else(|| BridgeError::Parse("where is missing value".into()))?;
    let value = codec.decode(operand)?;
    if op.takes_list() {
        match value.as_array() {
            Some(items) if items.len() > MAX_IN_SET => {
                return Err(BridgeError::Parse(format!(
                    "'{op}' accepts at most {MAX_IN_SET} values, got {}",
                    items.len()
                )));
            }
            Some(_) => {}
            None => return Err(BridgeError::Parse(format!("'{op}' requires an array value"))),
        }
    }
    Ok(FieldFilter { field, op, value })
}

fn parse_order_by(value: &Value) -> BridgeResult<OrderBy> {
    let obj = as_object(value, "orderBy")?;
    let field = required_str(obj, "field", "orderBy")?.to_owned();
    let direction = match obj.get("direction") {
        None | Some(Value::Null) => Direction::Asc,
        Some(Value::String(s)) => s.parse()?,
        Some(other) => {
            return Err(BridgeError::Parse(format!("orderBy.direction must be a string, got {other}")));
        }
    };
    Ok(OrderBy { field, direction })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawOperation {
        serde_json::from_value(v).unwrap()
    }

    fn known(v: Value) -> QueryOperation {
        match QueryOperation::parse(&raw(v), &ValueCodec::default()).unwrap() {
            ParsedOperation::Known(op) => op,
            ParsedOperation::Unknown(t) => panic!("unexpected unknown {t}"),
        }
    }

    #[test]
    fn parses_where_with_wrapped_date() {
        let op = known(json!({"queryType": "where", "value": {"field": "at", "operator": ">=", "value": "__DATE:1000"}}));
        let QueryOperation::Where(f) = op else { panic!("expected where") };
        assert_eq!(f.op, WhereOp::Gte);
        assert!(matches!(f.value, FieldValue::Timestamp(t) if t.to_millis() == 1000));
    }

    #[test]
    fn invalid_operator_is_a_parse_error() {
        let r = raw(json!({"queryType": "where", "value": {"field": "a", "operator": "~=", "value": 1}}));
        assert!(matches!(QueryOperation::parse(&r, &ValueCodec::default()), Err(BridgeError::Parse(_))));
    }

    #[test]
    fn in_requires_array() {
        let r = raw(json!({"queryType": "where", "value": {"field": "a", "operator": "in", "value": 1}}));
        assert!(QueryOperation::parse(&r, &ValueCodec::default()).is_err());
    }

    #[test]
    fn order_by_direction_defaults_to_ascending() {
        let op = known(json!({"queryType": "orderBy", "value": {"field": "a"}}));
        assert_eq!(op, QueryOperation::OrderBy(OrderBy { field: "a".into(), direction: Direction::Asc }));
        let op = known(json!({"queryType": "orderBy", "value": {"field": "a", "direction": "desc"}}));
        assert_eq!(op, QueryOperation::OrderBy(OrderBy { field: "a".into(), direction: Direction::Desc }));
    }

    #[test]
    fn limit_rejects_negative_and_fractional() {
        let codec = ValueCodec::default();
        assert!(QueryOperation::parse(&raw(json!({"queryType": "limit", "value": -1})), &codec).is_err());
        assert!(QueryOperation::parse(&raw(json!({"queryType": "limit", "value": 1.5})), &codec).is_err());
        assert!(QueryOperation::parse(&raw(json!({"queryType": "limit"})), &codec).is_err());
    }

    #[test]
    fn unknown_type_is_kept() {
        let parsed = QueryOperation::parse(&raw(json!({"queryType": "bogus"})), &ValueCodec::default()).unwrap();
        assert_eq!(parsed, ParsedOperation::Unknown("bogus".into()));
    }

    #[test]
    fn snapshot_shapes() {
        let codec = ValueCodec::default();
        let wrapped = json!({"_data": {"exists": true, "id": "d", "_data": {"x": 1}}});
        let inner = json!({"exists": true, "_data": {"x": 1}});
        let bare = json!({"x": 1});
        for v in [wrapped, inner, bare] {
            let CursorArg::Snapshot(s) = CursorArg::parse(&v, &codec).unwrap() else { panic!() };
            assert!(s.exists);
            assert_eq!(s.fields.get("x"), Some(&FieldValue::Integer(1)));
        }
        let missing = json!({"_data": {"exists": false}});
        let CursorArg::Snapshot(s) = CursorArg::parse(&missing, &codec).unwrap() else { panic!() };
        assert!(!s.exists);
        assert!(s.fields.is_empty());
    }

    #[test]
    fn document_field_named_exists_stays_a_bare_map() {
        let codec = ValueCodec::default();
        let bare = json!({"exists": true, "rank": 3});
        let CursorArg::Snapshot(s) = CursorArg::parse(&bare, &codec).unwrap() else { panic!() };
        assert_eq!(s.fields.len(), 2);
        assert_eq!(s.fields.get("rank"), Some(&FieldValue::Integer(3)));

        let flagged = json!({"exists": "yes", "_data": {"x": 1}});
        let CursorArg::Snapshot(s) = CursorArg::parse(&flagged, &codec).unwrap() else { panic!() };
        assert_eq!(s.fields.get("exists"), Some(&FieldValue::from("yes")));

        let wrapped = json!({"_data": {"exists": true, "score": 9}});
        let CursorArg::Snapshot(s) = CursorArg::parse(&wrapped, &codec).unwrap() else { panic!() };
        assert!(s.fields["_data"].as_map().is_some_and(|m| m.contains_key("score")));
    }

    #[test]
    fn scalar_cursor_is_single_value() {
        let c = CursorArg::parse(&json!("abc"), &ValueCodec::default()).unwrap();
        assert_eq!(c, CursorArg::Values(vec![FieldValue::String("abc".into())]));
    }
}
