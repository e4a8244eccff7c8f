use super::eval::{after_start, before_end, compare_docs, compare_to_cursor, eval_filter, lookup};
use super::types::Query;
use crate::snapshot::DocumentSnapshot;

/// Runs `query` over `docs`, which must be in store order.
///
/// Filters first, then a stable sort on the order-by keys (documents without
/// every order-by field drop out), then the cursor window, then the limit.
/// Without order-by keys the store order is kept.
#[must_use]
pub fn run_query(query: &Query, docs: Vec<DocumentSnapshot>) -> Vec<DocumentSnapshot> {
    let bench_start = std::time::Instant::now();
    let scanned = docs.len();
    let mut out: Vec<DocumentSnapshot> = docs
        .into_iter()
        .filter(|d| d.exists)
        .filter(|d| query.filters.iter().all(|f| eval_filter(&d.fields, f)))
        .filter(|d| query.order_by.iter().all(|o| lookup(&d.fields, &o.field).is_some()))
        .collect();

    if !query.order_by.is_empty() {
        out.sort_by(|a, b| compare_docs(&a.fields, &b.fields, &query.order_by));
    }

    for bound in [&query.start, &query.end].into_iter().flatten() {
        if bound.values.len() > query.order_by.len() + 1 {
            log::warn!(
                "cursor has {} values for {} order-by fields on {}; extra values ignored",
                bound.values.len(),
                query.order_by.len(),
                query.collection
            );
        }
    }
    if let Some(start) = &query.start
        && !start.values.is_empty()
    {
        out.retain(|d| after_start(compare_to_cursor(&d.fields, d.id(), &query.order_by, &start.values), start));
    }
    if let Some(end) = &query.end
        && !end.values.is_empty()
    {
        out.retain(|d| before_end(compare_to_cursor(&d.fields, d.id(), &query.order_by, &end.values), end));
    }

    if let Some(limit) = query.limit {
        out.truncate(limit);
    }
    crate::dev_trace!(
        "query",
        serde_json::json!({
            "collection": query.collection,
            "duration_ms": u64::try_from(bench_start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "scanned": scanned,
            "result_count": out.len(),
        })
    );
    out
}
