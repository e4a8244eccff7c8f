use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::path::DocumentPath;

const NANOS_PER_SECOND: u32 = 1_000_000_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// Field map of a document. Insertion order is preserved; cursor fallback
/// relies on it.
pub type MapValue = IndexMap<String, FieldValue>;

/// A native document field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(Timestamp),
    GeoPoint(GeoPoint),
    Reference(DocumentPath),
    Array(Vec<FieldValue>),
    Map(MapValue),
}

impl FieldValue {
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::GeoPoint(_) => "geopoint",
            Self::Reference(_) => "reference",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(t: Timestamp) -> Self {
        Self::Timestamp(t)
    }
}

impl From<GeoPoint> for FieldValue {
    fn from(g: GeoPoint) -> Self {
        Self::GeoPoint(g)
    }
}

impl From<DocumentPath> for FieldValue {
    fn from(p: DocumentPath) -> Self {
        Self::Reference(p)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(v: Vec<FieldValue>) -> Self {
        Self::Array(v)
    }
}

impl From<MapValue> for FieldValue {
    fn from(m: MapValue) -> Self {
        Self::Map(m)
    }
}

/// A point in time with nanosecond resolution, counted from the Unix epoch.
///
/// `nanos` is always in `0..1_000_000_000`; negative instants carry a negative
/// `seconds` and a positive fraction. Constructors clamp to the instants whose
/// millisecond count fits an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

impl Timestamp {
    pub const MIN: Self = Self::from_millis(i64::MIN);
    pub const MAX: Self = Self::from_millis(i64::MAX);

    /// Builds a timestamp, carrying whole seconds out of `nanos`. Instants past
    /// either end of the millisecond range become [`Timestamp::MIN`] or
    /// [`Timestamp::MAX`].
    #[must_use]
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        let seconds = seconds.saturating_add((nanos / NANOS_PER_SECOND) as i64);
        let nanos = nanos % NANOS_PER_SECOND;
        let millis = seconds as i128 * 1000 + (nanos / NANOS_PER_MILLI) as i128;
        if millis > i64::MAX as i128 {
            Self::MAX
        } else if millis < i64::MIN as i128 {
            Self::MIN
        } else {
            Self { seconds, nanos }
        }
    }

    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) as u32) * NANOS_PER_MILLI,
        }
    }

    #[must_use]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    #[must_use]
    pub const fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Milliseconds since the epoch; the sub-millisecond fraction is truncated.
    #[must_use]
    pub const fn to_millis(&self) -> i64 {
        // seconds * 1000 alone leaves i64 at Timestamp::MIN
        (self.seconds as i128 * 1000 + (self.nanos / NANOS_PER_MILLI) as i128) as i64
    }

    /// Drops the sub-millisecond part.
    #[must_use]
    pub const fn truncate_to_millis(&self) -> Self {
        Self::from_millis(self.to_millis())
    }

    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::new(dt.timestamp(), dt.timestamp_subsec_nanos())
    }

    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}
