//! JSON wire encoding of native field values.
//!
//! Decode attempt order:
//! - strings: date prefix, timestamp prefix, geo-point prefix, reference
//!   prefix, then plain string;
//! - objects: `{seconds, nanoseconds}` date shape, then `{lat, lng}` geo-point
//!   shape, then nested map.
//!
//! Once a wrapped shape matches, a malformed payload is a `Decode` error; it is
//! never reinterpreted as plain data.

use std::sync::LazyLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::path::DocumentPath;
use super::types::{FieldValue, GeoPoint, MapValue, Timestamp};
use crate::errors::{BridgeError, BridgeResult};

pub const DEFAULT_DATE_PREFIX: &str = "__DATE:";
pub const DEFAULT_REFERENCE_PREFIX: &str = "__REFERENCE:";
pub const DEFAULT_TIMESTAMP_PREFIX: &str = "__TIMESTAMP:";
pub const DEFAULT_GEOPOINT_PREFIX: &str = "__GEOPOINT:";

const SECONDS_KEY: &str = "seconds";
const NANOSECONDS_KEY: &str = "nanoseconds";
const LAT_KEY: &str = "lat";
const LNG_KEY: &str = "lng";

/// Wire form used when encoding timestamps. Decoding always accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    #[default]
    Prefixed,
    SecondsNanos,
}

/// Prefixes marking wrapped strings, and the timestamp encoding.
///
/// `timestamp_prefix` (`"<s>_<n>"` or `"<s>"`) and `geopoint_prefix`
/// (`"<lat>,<lng>"`) are only decoded; encoding uses `date_format` and the
/// `{lat, lng}` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecOptions {
    pub date_prefix: String,
    pub reference_prefix: String,
    #[serde(default = "default_timestamp_prefix")]
    pub timestamp_prefix: String,
    #[serde(default = "default_geopoint_prefix")]
    pub geopoint_prefix: String,
    #[serde(default)]
    pub date_format: DateFormat,
}

fn default_timestamp_prefix() -> String {
    DEFAULT_TIMESTAMP_PREFIX.to_owned()
}

fn default_geopoint_prefix() -> String {
    DEFAULT_GEOPOINT_PREFIX.to_owned()
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            date_prefix: DEFAULT_DATE_PREFIX.to_owned(),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_owned(),
            timestamp_prefix: default_timestamp_prefix(),
            geopoint_prefix: default_geopoint_prefix(),
            date_format: DateFormat::Prefixed,
        }
    }
}

impl CodecOptions {
    fn prefixes(&self) -> [(&'static str, &str); 4] {
        [
            ("date", self.date_prefix.as_str()),
            ("timestamp", self.timestamp_prefix.as_str()),
            ("geopoint", self.geopoint_prefix.as_str()),
            ("reference", self.reference_prefix.as_str()),
        ]
    }

    /// # Errors
    /// Returns `Config` if a prefix is empty or one prefix shadows another.
    pub fn validate(&self) -> BridgeResult<()> {
        let prefixes = self.prefixes();
        for (i, (name, p)) in prefixes.iter().enumerate() {
            if p.is_empty() {
                return Err(BridgeError::Config(format!("{name} prefix must not be empty")));
            }
            for (other, q) in &prefixes[i + 1..] {
                if p.starts_with(q) || q.starts_with(p) {
                    return Err(BridgeError::Config(format!(
                        "{name} prefix {p:?} and {other} prefix {q:?} overlap"
                    )));
                }
            }
        }
        Ok(())
    }
}

static GLOBAL_OPTIONS: LazyLock<RwLock<CodecOptions>> =
    LazyLock::new(|| RwLock::new(CodecOptions::default()));

/// Current process-wide codec options.
#[must_use]
pub fn global_options() -> CodecOptions {
    GLOBAL_OPTIONS.read().clone()
}

/// Replaces the process-wide codec options.
///
/// # Errors
/// Returns `Config` if the options fail validation; the previous options stay in place.
pub fn install_options(options: CodecOptions) -> BridgeResult<()> {
    options.validate()?;
    log::info!(
        "codec options: date_prefix={:?} timestamp_prefix={:?} geopoint_prefix={:?} reference_prefix={:?} date_format={:?}",
        options.date_prefix,
        options.timestamp_prefix,
        options.geopoint_prefix,
        options.reference_prefix,
        options.date_format
    );
    *GLOBAL_OPTIONS.write() = options;
    Ok(())
}

/// # Errors
/// Returns `Config` if the prefix is empty or overlaps another prefix.
pub fn set_date_prefix(prefix: impl Into<String>) -> BridgeResult<()> {
    let mut next = global_options();
    next.date_prefix = prefix.into();
    install_options(next)
}

/// # Errors
/// Returns `Config` if the prefix is empty or overlaps another prefix.
pub fn set_reference_prefix(prefix: impl Into<String>) -> BridgeResult<()> {
    let mut next = global_options();
    next.reference_prefix = prefix.into();
    install_options(next)
}

/// # Errors
/// Returns `Config` if the prefix is empty or overlaps another prefix.
pub fn set_timestamp_prefix(prefix: impl Into<String>) -> BridgeResult<()> {
    let mut next = global_options();
    next.timestamp_prefix = prefix.into();
    install_options(next)
}

/// # Errors
/// Returns `Config` if the prefix is empty or overlaps another prefix.
pub fn set_geopoint_prefix(prefix: impl Into<String>) -> BridgeResult<()> {
    let mut next = global_options();
    next.geopoint_prefix = prefix.into();
    install_options(next)
}

/// `ValueCodec::is_wrapped_date` against the process-wide options.
#[must_use]
pub fn is_wrapped_date(value: &Value) -> bool {
    ValueCodec::global().is_wrapped_date(value)
}

/// Converts between [`FieldValue`] and JSON with a fixed set of options.
///
/// The options are captured at construction, so encode and decode performed
/// through one codec always agree on prefixes.
#[derive(Debug, Clone, Default)]
pub struct ValueCodec {
    options: CodecOptions,
}

impl ValueCodec {
    #[must_use]
    pub const fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    /// Codec over a snapshot of the process-wide options.
    #[must_use]
    pub fn global() -> Self {
        Self::new(global_options())
    }

    #[must_use]
    pub const fn options(&self) -> &CodecOptions {
        &self.options
    }

    #[must_use]
    pub fn encode(&self, value: &FieldValue) -> Value {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number(Number::from(*i)),
            // JSON has no NaN or infinities
            FieldValue::Double(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Timestamp(t) => self.wrap_date(*t),
            FieldValue::GeoPoint(g) => {
                let mut m = Map::with_capacity(2);
                m.insert(LAT_KEY.to_owned(), float_value(g.latitude));
                m.insert(LNG_KEY.to_owned(), float_value(g.longitude));
                Value::Object(m)
            }
            FieldValue::Reference(p) => {
                Value::String(format!("{}{}", self.options.reference_prefix, p))
            }
            FieldValue::Array(items) => Value::Array(items.iter().map(|v| self.encode(v)).collect()),
            FieldValue::Map(m) => Value::Object(self.encode_map(m)),
        }
    }

    #[must_use]
    pub fn encode_map(&self, map: &MapValue) -> Map<String, Value> {
        map.iter().map(|(k, v)| (k.clone(), self.encode(v))).collect()
    }

    /// # Errors
    /// Returns `Decode` when a wrapped value (date, reference, geo-point) is malformed.
    pub fn decode(&self, value: &Value) -> BridgeResult<FieldValue> {
        Ok(match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => decode_number(n),
            Value::String(s) => self.decode_string(s)?,
            Value::Array(items) => FieldValue::Array(
                items.iter().map(|v| self.decode(v)).collect::<BridgeResult<_>>()?,
            ),
            Value::Object(m) => {
                if is_date_shape(m) {
                    FieldValue::Timestamp(unwrap_date_map(m)?)
                } else if let Some(g) = decode_geo_point(m)? {
                    FieldValue::GeoPoint(g)
                } else {
                    FieldValue::Map(self.decode_map(m)?)
                }
            }
        })
    }

    /// # Errors
    /// Returns `Decode` when any nested wrapped value is malformed.
    pub fn decode_map(&self, map: &Map<String, Value>) -> BridgeResult<MapValue> {
        map.iter().map(|(k, v)| self.decode(v).map(|d| (k.clone(), d))).collect()
    }

    /// True exactly for a string carrying the date prefix or an object holding
    /// both `seconds` and `nanoseconds` keys.
    #[must_use]
    pub fn is_wrapped_date(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => s.starts_with(&self.options.date_prefix),
            Value::Object(m) => is_date_shape(m),
            _ => false,
        }
    }

    /// # Errors
    /// Returns `Decode` if `value` is not a wrapped date or its payload is malformed.
    pub fn unwrap_date(&self, value: &Value) -> BridgeResult<Timestamp> {
        match value {
            Value::String(s) => match s.strip_prefix(&self.options.date_prefix) {
                Some(rest) => parse_millis(rest, s),
                None => Err(BridgeError::Decode(format!("not a wrapped date: {s:?}"))),
            },
            Value::Object(m) if is_date_shape(m) => unwrap_date_map(m),
            other => Err(BridgeError::Decode(format!("not a wrapped date: {other}"))),
        }
    }

    #[must_use]
    pub fn wrap_date(&self, t: Timestamp) -> Value {
        match self.options.date_format {
            DateFormat::Prefixed => {
                Value::String(format!("{}{}", self.options.date_prefix, t.to_millis()))
            }
            DateFormat::SecondsNanos => {
                let mut m = Map::with_capacity(2);
                m.insert(SECONDS_KEY.to_owned(), Value::from(t.seconds()));
                m.insert(NANOSECONDS_KEY.to_owned(), Value::from(t.nanos()));
                Value::Object(m)
            }
        }
    }

    fn decode_string(&self, s: &str) -> BridgeResult<FieldValue> {
        if let Some(rest) = s.strip_prefix(&self.options.date_prefix) {
            return parse_millis(rest, s).map(FieldValue::Timestamp);
        }
        if let Some(rest) = s.strip_prefix(&self.options.timestamp_prefix) {
            return parse_timestamp(rest, s).map(FieldValue::Timestamp);
        }
        if let Some(rest) = s.strip_prefix(&self.options.geopoint_prefix) {
            return parse_geo_point(rest, s).map(FieldValue::GeoPoint);
        }
        if let Some(rest) = s.strip_prefix(&self.options.reference_prefix) {
            return DocumentPath::parse(rest)
                .map(FieldValue::Reference)
                .map_err(|e| BridgeError::Decode(format!("bad reference {s:?}: {e}")));
        }
        Ok(FieldValue::String(s.to_owned()))
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn decode_number(n: &Number) -> FieldValue {
    if let Some(i) = n.as_i64() {
        FieldValue::Integer(i)
    } else {
        FieldValue::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn is_date_shape(m: &Map<String, Value>) -> bool {
    m.contains_key(SECONDS_KEY) && m.contains_key(NANOSECONDS_KEY)
}

fn parse_millis(digits: &str, original: &str) -> BridgeResult<Timestamp> {
    // i64::from_str accepts a leading '+', which no encoder emits
    if digits.starts_with('+') {
        return Err(BridgeError::Decode(format!("bad wrapped date {original:?}")));
    }
    digits
        .parse::<i64>()
        .map(Timestamp::from_millis)
        .map_err(|e| BridgeError::Decode(format!("bad wrapped date {original:?}: {e}")))
}

/// `"<seconds>_<nanoseconds>"`, or `"<seconds>"` alone.
fn parse_timestamp(payload: &str, original: &str) -> BridgeResult<Timestamp> {
    let bad = |detail: String| BridgeError::Decode(format!("bad wrapped timestamp {original:?}: {detail}"));
    let (seconds, nanos) = payload.split_once('_').unwrap_or((payload, "0"));
    if seconds.starts_with('+') || nanos.starts_with('+') {
        return Err(bad("explicit sign".into()));
    }
    let seconds = seconds.parse::<i64>().map_err(|e| bad(e.to_string()))?;
    let nanos = nanos.parse::<u32>().map_err(|e| bad(e.to_string()))?;
    if nanos >= 1_000_000_000 {
        return Err(bad(format!("nanoseconds {nanos} out of range")));
    }
    if !(Timestamp::MIN.seconds()..=Timestamp::MAX.seconds()).contains(&seconds) {
        return Err(bad(format!("seconds {seconds} out of range")));
    }
    Ok(Timestamp::new(seconds, nanos))
}

/// `"<lat>,<lng>"` in degrees.
fn parse_geo_point(payload: &str, original: &str) -> BridgeResult<GeoPoint> {
    let parsed = payload
        .split_once(',')
        .and_then(|(lat, lng)| Some((lat.trim().parse::<f64>().ok()?, lng.trim().parse::<f64>().ok()?)));
    match parsed.map(|(lat, lng)| GeoPoint::new(lat, lng)) {
        Some(g) if g.is_valid() => Ok(g),
        _ => Err(BridgeError::Decode(format!("bad wrapped geo-point {original:?}"))),
    }
}

fn integral(v: Option<&Value>) -> Option<i64> {
    let n = v?.as_number()?;
    // Fractions are truncated toward zero
    n.as_i64().or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
}

fn unwrap_date_map(m: &Map<String, Value>) -> BridgeResult<Timestamp> {
    let (Some(seconds), Some(nanos)) = (integral(m.get(SECONDS_KEY)), integral(m.get(NANOSECONDS_KEY)))
    else {
        return Err(BridgeError::Decode(format!(
            "wrapped date needs numeric seconds and nanoseconds: {}",
            Value::Object(m.clone())
        )));
    };
    seconds
        .checked_mul(1000)
        .and_then(|ms| ms.checked_add(nanos / 1_000_000))
        .map(Timestamp::from_millis)
        .ok_or_else(|| BridgeError::Decode(format!("wrapped date out of range: {seconds}s")))
}

fn decode_geo_point(m: &Map<String, Value>) -> BridgeResult<Option<GeoPoint>> {
    if m.len() != 2 {
        return Ok(None);
    }
    let (Some(lat), Some(lng)) = (m.get(LAT_KEY), m.get(LNG_KEY)) else {
        return Ok(None);
    };
    let (Some(lat), Some(lng)) = (lat.as_f64(), lng.as_f64()) else {
        return Ok(None);
    };
    let g = GeoPoint::new(lat, lng);
    if !g.is_valid() {
        return Err(BridgeError::Decode(format!("geo-point out of range: ({lat}, {lng})")));
    }
    Ok(Some(g))
}
