use docbridge::query::{Query, QueryPipeline, run_query};
use docbridge::snapshot::{DocumentSnapshot, SnapshotMetadata};
use docbridge::value::{DocumentPath, FieldValue, MapValue};
use proptest::prelude::*;
use serde_json::json;

fn docs(ages: &[i64]) -> Vec<DocumentSnapshot> {
    ages.iter()
        .enumerate()
        .map(|(i, age)| {
            let mut m = MapValue::new();
            m.insert("age".into(), FieldValue::Integer(*age));
            DocumentSnapshot::found(
                DocumentPath::in_collection("p", &format!("d{i}")).unwrap(),
                m,
                SnapshotMetadata::default(),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        .. proptest::test_runner::Config::default()
    })]

    // Where + limit yields the first matches in store order
    #[test]
    fn prop_where_limit_is_store_order_prefix(ages in proptest::collection::vec(0i64..100, 0..30), min in 0i64..100, limit in 0usize..10) {
        let ops = json!([
            {"queryType": "where", "value": {"field": "age", "operator": ">", "value": min}},
            {"queryType": "limit", "value": limit}
        ]);
        let q = QueryPipeline::default().apply(Query::collection("p"), &ops).unwrap();
        let got: Vec<i64> = run_query(&q, docs(&ages))
            .iter()
            .filter_map(|d| match d.get("age") { Some(FieldValue::Integer(a)) => Some(*a), _ => None })
            .collect();
        let expected: Vec<i64> = ages.iter().copied().filter(|a| *a > min).take(limit).collect();
        prop_assert_eq!(got, expected);
    }

    // Moving orderBy entries after a cursor does not change the composed query
    #[test]
    fn prop_order_by_position_irrelevant(x in any::<i32>(), y in any::<i32>(), cut in 0usize..3) {
        let cursor = json!({"queryType": "startAt", "value": {"_data": {"exists": true, "_data": {"y": y, "x": x}}}});
        let mut ops = vec![
            json!({"queryType": "orderBy", "value": {"field": "x"}}),
            json!({"queryType": "orderBy", "value": {"field": "y"}}),
        ];
        ops.insert(cut, cursor);
        let q = QueryPipeline::default().apply(Query::collection("c"), &serde_json::Value::Array(ops)).unwrap();
        prop_assert_eq!(q.order_by.len(), 2);
        prop_assert_eq!(
            q.start.unwrap().values,
            vec![FieldValue::Integer(i64::from(x)), FieldValue::Integer(i64::from(y))]
        );
    }
}
