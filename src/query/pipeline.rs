use serde_json::{Value, json};

use super::operation::{ParsedOperation, QueryOperation, RawOperation};
use super::types::{MAX_OPERATIONS, Query};
use crate::errors::{BridgeError, BridgeResult};
use crate::value::ValueCodec;

/// Order-by field names collected from one operation list, in array order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderByFields(Vec<String>);

impl OrderByFields {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for OrderByFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Non-fatal findings of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    UnknownOperation { index: usize, query_type: String },
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub query: Query,
    pub order_by_fields: OrderByFields,
    pub warnings: Vec<PipelineWarning>,
}

/// Folds a JSON operation list into a [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryPipeline {
    codec: ValueCodec,
}

impl QueryPipeline {
    #[must_use]
    pub const fn new(codec: ValueCodec) -> Self {
        Self { codec }
    }

    /// Pipeline over the process-wide codec options.
    #[must_use]
    pub fn global() -> Self {
        Self::new(ValueCodec::global())
    }

    /// Parses every entry of `operations`, which must be a JSON array.
    ///
    /// # Errors
    /// `Parse` for a non-array input, an entry without `queryType`, or a known
    /// operation with a malformed value; `Decode` for malformed wrapped values.
    pub fn parse(&self, operations: &Value) -> BridgeResult<Vec<ParsedOperation>> {
        let entries = operations
            .as_array()
            .ok_or_else(|| BridgeError::Parse(format!("query operations must be an array, got {operations}")))?;
        if entries.len() > MAX_OPERATIONS {
            return Err(BridgeError::Parse(format!(
                "too many query operations: {} (max {MAX_OPERATIONS})",
                entries.len()
            )));
        }
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let raw: RawOperation = serde_json::from_value(entry.clone())
                    .map_err(|e| BridgeError::Parse(format!("operation {i}: {e}")))?;
                QueryOperation::parse(&raw, &self.codec).map_err(|e| match e {
                    BridgeError::Parse(m) => BridgeError::Parse(format!("operation {i}: {m}")),
                    other => other,
                })
            })
            .collect()
    }

    /// # Errors
    /// See [`QueryPipeline::parse`].
    pub fn apply(&self, base: Query, operations: &Value) -> BridgeResult<Query> {
        self.apply_with_report(base, operations).map(|outcome| outcome.query)
    }

    /// Applies the operations and also reports what was collected and skipped.
    ///
    /// # Errors
    /// See [`QueryPipeline::parse`].
    pub fn apply_with_report(&self, base: Query, operations: &Value) -> BridgeResult<PipelineOutcome> {
        let parsed = self.parse(operations)?;
        log::debug!("processing {} query operations on {}", parsed.len(), base.collection);
        Ok(fold_operations(base, &parsed))
    }
}

/// First pass: order-by fields of the whole list, whatever their position.
#[must_use]
pub fn collect_order_by_fields(operations: &[ParsedOperation]) -> OrderByFields {
    operations
        .iter()
        .filter_map(|op| match op {
            ParsedOperation::Known(QueryOperation::OrderBy(o)) => Some(o.field.clone()),
            _ => None,
        })
        .collect()
}

/// Second pass: applies operations in array order, skipping unknown ones.
#[must_use]
pub fn fold_operations(base: Query, operations: &[ParsedOperation]) -> PipelineOutcome {
    let order_by_fields = collect_order_by_fields(operations);
    let mut warnings = Vec::new();
    let mut query = base;
    for (index, op) in operations.iter().enumerate() {
        match op {
            ParsedOperation::Known(op) => query = op.apply(query, &order_by_fields),
            ParsedOperation::Unknown(query_type) => {
                log::warn!("Unknown query type {query_type} at index {index}; skipped");
                warnings.push(PipelineWarning::UnknownOperation {
                    index,
                    query_type: query_type.clone(),
                });
            }
        }
    }
    crate::dev_trace!(
        "pipeline",
        json!({
            "collection": query.collection,
            "operations": operations.len(),
            "order_by": order_by_fields.len(),
            "skipped": warnings.len(),
        })
    );
    PipelineOutcome { query, order_by_fields, warnings }
}
