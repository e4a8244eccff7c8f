//! Query model, the JSON operation pipeline that builds it, and in-memory execution.
mod eval;
mod exec;
mod operation;
mod pipeline;
mod types;

pub use eval::{compare_values, eval_filter, lookup, values_equal};
pub use exec::run_query;
pub use operation::{CursorArg, ParsedOperation, QueryOperation, RawOperation, SnapshotArg};
pub use pipeline::{
    OrderByFields, PipelineOutcome, PipelineWarning, QueryPipeline, collect_order_by_fields,
    fold_operations,
};
pub use types::{Bound, Direction, FieldFilter, OrderBy, Query, WhereOp};
