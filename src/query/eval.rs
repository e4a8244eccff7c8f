use std::cmp::Ordering;

use super::types::{Bound, Direction, FieldFilter, MAX_PATH_DEPTH, OrderBy, WhereOp};
use crate::value::{FieldValue, MapValue};

/// Resolves a dotted field path inside a field map.
#[must_use]
pub fn lookup<'a>(fields: &'a MapValue, path: &str) -> Option<&'a FieldValue> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = fields;
    let mut parts = path.split('.').take(MAX_PATH_DEPTH + 1).enumerate().peekable();
    while let Some((depth, part)) = parts.next() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        let v = cur.get(part)?;
        if parts.peek().is_none() {
            return Some(v);
        }
        match v {
            FieldValue::Map(m) => cur = m,
            _ => return None,
        }
    }
    None
}

#[must_use]
pub fn eval_filter(fields: &MapValue, filter: &FieldFilter) -> bool {
    let Some(v) = lookup(fields, &filter.field) else {
        return false;
    };
    let operand = &filter.value;
    match filter.op {
        WhereOp::Eq => values_equal(v, operand),
        WhereOp::Ne => !matches!(v, FieldValue::Null) && !values_equal(v, operand),
        WhereOp::Lt => comparable(v, operand) && compare_values(v, operand) == Ordering::Less,
        WhereOp::Lte => comparable(v, operand) && compare_values(v, operand) != Ordering::Greater,
        WhereOp::Gt => comparable(v, operand) && compare_values(v, operand) == Ordering::Greater,
        WhereOp::Gte => comparable(v, operand) && compare_values(v, operand) != Ordering::Less,
        WhereOp::ArrayContains => {
            v.as_array().is_some_and(|items| items.iter().any(|x| values_equal(x, operand)))
        }
        WhereOp::ArrayContainsAny => match (v.as_array(), operand.as_array()) {
            (Some(items), Some(wanted)) => {
                items.iter().any(|x| wanted.iter().any(|w| values_equal(x, w)))
            }
            _ => false,
        },
        WhereOp::In => operand.as_array().is_some_and(|set| set.iter().any(|w| values_equal(v, w))),
        WhereOp::NotIn => {
            !matches!(v, FieldValue::Null)
                && operand.as_array().is_some_and(|set| !set.iter().any(|w| values_equal(v, w)))
        }
    }
}

/// Orders two field maps by the given sort keys.
#[must_use]
pub fn compare_docs(a: &MapValue, b: &MapValue, order_by: &[OrderBy]) -> Ordering {
    for o in order_by {
        let ord = match (lookup(a, &o.field), lookup(b, &o.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return directed(ord, o.direction);
        }
    }
    Ordering::Equal
}

/// Compares a document's sort keys with a cursor, in sort order.
///
/// Cursor values line up positionally with `order_by`; one extra value is
/// compared against the document id. Values beyond that are ignored.
#[must_use]
pub fn compare_to_cursor(fields: &MapValue, id: &str, order_by: &[OrderBy], cursor: &[FieldValue]) -> Ordering {
    for (i, want) in cursor.iter().enumerate() {
        let ord = match order_by.get(i) {
            Some(o) => {
                let ord = lookup(fields, &o.field).map_or(Ordering::Less, |have| compare_values(have, want));
                directed(ord, o.direction)
            }
            None if i == order_by.len() => {
                let dir = order_by.last().map_or(Direction::Asc, |o| o.direction);
                let ord = match want {
                    FieldValue::String(s) => id.cmp(s.as_str()),
                    FieldValue::Reference(p) => id.cmp(p.id()),
                    other => type_rank(&FieldValue::String(String::new())).cmp(&type_rank(other)),
                };
                directed(ord, dir)
            }
            None => break,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// True if a document at `ord` (relative to the bound) lies inside a lower bound.
#[must_use]
pub fn after_start(ord: Ordering, bound: &Bound) -> bool {
    if bound.inclusive { ord != Ordering::Less } else { ord == Ordering::Greater }
}

/// True if a document at `ord` (relative to the bound) lies inside an upper bound.
#[must_use]
pub fn before_end(ord: Ordering, bound: &Bound) -> bool {
    if bound.inclusive { ord != Ordering::Greater } else { ord == Ordering::Less }
}

const fn directed(ord: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

/// Range operators only match values of the same kind.
fn comparable(a: &FieldValue, b: &FieldValue) -> bool {
    type_rank(a) == type_rank(b) && !matches!(a, FieldValue::Null)
}

#[must_use]
pub fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    compare_values(a, b) == Ordering::Equal
}

/// Total order across value kinds: null, boolean, number, timestamp, string,
/// reference, geo-point, array, map. Integers and doubles compare numerically.
#[must_use]
pub fn compare_values(a: &FieldValue, b: &FieldValue) -> Ordering {
    use FieldValue as V;
    match (a, b) {
        (V::Null, V::Null) => Ordering::Equal,
        (V::Boolean(x), V::Boolean(y)) => x.cmp(y),
        (V::Integer(x), V::Integer(y)) => x.cmp(y),
        (V::Integer(x), V::Double(y)) => compare_int_f64(*x, *y),
        (V::Double(x), V::Integer(y)) => compare_int_f64(*y, *x).reverse(),
        (V::Double(x), V::Double(y)) => compare_f64(*x, *y),
        (V::Timestamp(x), V::Timestamp(y)) => x.cmp(y),
        (V::String(x), V::String(y)) => x.cmp(y),
        (V::Reference(x), V::Reference(y)) => x.cmp(y),
        (V::GeoPoint(x), V::GeoPoint(y)) => compare_f64(x.latitude, y.latitude)
            .then_with(|| compare_f64(x.longitude, y.longitude)),
        (V::Array(x), V::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (V::Map(x), V::Map(y)) => {
            let mut xs: Vec<_> = x.iter().collect();
            let mut ys: Vec<_> = y.iter().collect();
            xs.sort_by(|l, r| l.0.cmp(r.0));
            ys.sort_by(|l, r| l.0.cmp(r.0));
            for ((lk, lv), (rk, rv)) in xs.iter().zip(&ys) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            xs.len().cmp(&ys.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// NaN sorts before every other number and equals itself.
fn compare_f64(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Exact comparison without rounding `i` through `f64`.
fn compare_int_f64(i: i64, f: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    // in range, so the cast is exact
    i.cmp(&(whole as i64)).then_with(|| compare_f64(whole, f))
}

const fn type_rank(v: &FieldValue) -> u8 {
    match v {
        FieldValue::Null => 0,
        FieldValue::Boolean(_) => 1,
        FieldValue::Integer(_) | FieldValue::Double(_) => 2,
        FieldValue::Timestamp(_) => 3,
        FieldValue::String(_) => 4,
        FieldValue::Reference(_) => 5,
        FieldValue::GeoPoint(_) => 6,
        FieldValue::Array(_) => 7,
        FieldValue::Map(_) => 8,
    }
}
