use docbridge::value::{CodecOptions, DateFormat, FieldValue, Timestamp, ValueCodec};
use proptest::prelude::*;

fn codec(format: DateFormat) -> ValueCodec {
    ValueCodec::new(CodecOptions { date_format: format, ..CodecOptions::default() })
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        .. proptest::test_runner::Config::default()
    })]

    // Both wire forms recover the timestamp at millisecond precision
    #[test]
    fn prop_date_round_trip(secs in -62_135_596_800i64..253_402_300_799, nanos in 0u32..1_000_000_000) {
        let t = Timestamp::new(secs, nanos);
        for format in [DateFormat::Prefixed, DateFormat::SecondsNanos] {
            let c = codec(format);
            let wire = c.encode(&FieldValue::Timestamp(t));
            prop_assert!(c.is_wrapped_date(&wire));
            prop_assert_eq!(c.decode(&wire).unwrap(), FieldValue::Timestamp(t.truncate_to_millis()));
        }
    }

    #[test]
    fn prop_millis_round_trip(ms in -8_000_000_000_000_000i64..8_000_000_000_000_000) {
        let c = codec(DateFormat::Prefixed);
        let wire = c.wrap_date(Timestamp::from_millis(ms));
        prop_assert_eq!(c.unwrap_date(&wire).unwrap().to_millis(), ms);
    }

    // Plain strings never look like dates unless they carry the prefix
    #[test]
    fn prop_is_wrapped_date_exact(s in "[a-zA-Z0-9 :_]{0,24}") {
        let c = codec(DateFormat::Prefixed);
        let v = serde_json::Value::String(s.clone());
        prop_assert_eq!(c.is_wrapped_date(&v), s.starts_with("__DATE:"));
    }

    #[test]
    fn prop_integers_pass_through(i in any::<i64>()) {
        let c = codec(DateFormat::Prefixed);
        prop_assert_eq!(c.decode(&c.encode(&FieldValue::Integer(i))).unwrap(), FieldValue::Integer(i));
    }
}
