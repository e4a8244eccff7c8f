use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::BridgeError;
use crate::value::FieldValue;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 30;
pub(crate) const MAX_OPERATIONS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = BridgeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(BridgeError::Parse(format!("unknown order direction {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereOp {
    Lt,
    Lte,
    Eq,
    Ne,
    Gt,
    Gte,
    ArrayContains,
    ArrayContainsAny,
    In,
    NotIn,
}

impl WhereOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
            Self::In => "in",
            Self::NotIn => "not-in",
        }
    }

    /// Operators whose operand is a list of candidates.
    #[must_use]
    pub const fn takes_list(self) -> bool {
        matches!(self, Self::ArrayContainsAny | Self::In | Self::NotIn)
    }
}

impl FromStr for WhereOp {
    type Err = BridgeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "<" => Self::Lt,
            "<=" => Self::Lte,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "array-contains" => Self::ArrayContains,
            "array-contains-any" => Self::ArrayContainsAny,
            "in" => Self::In,
            "not-in" => Self::NotIn,
            other => return Err(BridgeError::Parse(format!("unknown where operator {other:?}"))),
        })
    }
}

impl fmt::Display for WhereOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: WhereOp,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// One side of a query window.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub values: Vec<FieldValue>,
    pub inclusive: bool,
}

/// A composed query against one collection.
///
/// Built by folding query operations over a base query; every builder method
/// consumes and returns the query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<FieldFilter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub start: Option<Bound>,
    pub end: Option<Bound>,
}

impl Query {
    #[must_use]
    pub fn collection(path: impl Into<String>) -> Self {
        Self { collection: path.into(), ..Self::default() }
    }

    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    #[must_use]
    pub fn where_field(mut self, field: impl Into<String>, op: WhereOp, value: FieldValue) -> Self {
        self.filters.push(FieldFilter { field: field.into(), op, value });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy { field: field.into(), direction });
        self
    }

    #[must_use]
    pub fn start_at(mut self, values: Vec<FieldValue>) -> Self {
        self.start = Some(Bound { values, inclusive: true });
        self
    }

    #[must_use]
    pub fn start_after(mut self, values: Vec<FieldValue>) -> Self {
        self.start = Some(Bound { values, inclusive: false });
        self
    }

    #[must_use]
    pub fn end_at(mut self, values: Vec<FieldValue>) -> Self {
        self.end = Some(Bound { values, inclusive: true });
        self
    }

    #[must_use]
    pub fn end_before(mut self, values: Vec<FieldValue>) -> Self {
        self.end = Some(Bound { values, inclusive: false });
        self
    }
}
