//! Property tests for the primitive value codec.

use brokerwire::value::{PrimitiveMap, PrimitiveValue, ValueKind};
use proptest::prelude::*;

proptest! {
    #[test]
    fn integers_survive_a_trip_through_text(n in any::<i32>()) {
        let text: String = PrimitiveValue::from(n).convert()?;
        let back: i32 = PrimitiveValue::from_string(text).convert()?;
        prop_assert_eq!(back, n);
    }

    #[test]
    fn longs_survive_a_trip_through_text(n in any::<i64>()) {
        let text = PrimitiveValue::from(n).to_string();
        prop_assert_eq!(PrimitiveValue::from_string(text).convert::<i64>()?, n);
    }

    #[test]
    fn finite_floats_survive_a_trip_through_text(x in proptest::num::f32::NORMAL) {
        let text = PrimitiveValue::from(x).to_string();
        prop_assert_eq!(PrimitiveValue::from_string(text).convert::<f32>()?, x);
    }

    #[test]
    fn integer_widening_is_exact(b in any::<u8>(), s in any::<i16>(), i in any::<i32>()) {
        let byte = PrimitiveValue::from(b);
        prop_assert_eq!(byte.convert::<i16>()?, i16::from(b));
        prop_assert_eq!(byte.convert::<i32>()?, i32::from(b));
        prop_assert_eq!(byte.convert::<i64>()?, i64::from(b));

        let short = PrimitiveValue::from(s);
        prop_assert_eq!(short.convert::<i32>()?, i32::from(s));
        prop_assert_eq!(short.convert::<i64>()?, i64::from(s));

        prop_assert_eq!(PrimitiveValue::from(i).convert::<i64>()?, i64::from(i));
    }

    #[test]
    fn float_widens_to_double_exactly(x in any::<f32>().prop_filter("finite", |x| x.is_finite())) {
        prop_assert_eq!(PrimitiveValue::from(x).convert::<f64>()?, f64::from(x));
    }

    #[test]
    fn narrowing_is_refused(n in any::<i64>(), d in any::<f64>()) {
        let long = PrimitiveValue::from(n);
        prop_assert!(long.convert::<i32>().is_err());
        prop_assert!(long.convert::<i16>().is_err());
        prop_assert!(long.convert::<u8>().is_err());
        prop_assert!(PrimitiveValue::from(d).convert::<f32>().is_err());
    }

    #[test]
    fn alphabetic_text_is_not_numeric(text in "[a-zA-Z]{1,12}") {
        let value = PrimitiveValue::from_string(text);
        let error = value.convert::<i32>().expect_err("letters never parse as an int");
        prop_assert_eq!(error.to_string(), "Unsupported Type Conversion");
        prop_assert_eq!(error.source_kind(), ValueKind::String);
        prop_assert_eq!(error.target_kind(), ValueKind::Int);
        prop_assert!(value.convert::<f64>().is_err());
        prop_assert!(value.convert::<u8>().is_err());
    }

    #[test]
    fn every_value_reads_as_text(b in any::<bool>(), c in any::<char>(), n in any::<i64>()) {
        for value in [PrimitiveValue::from(b), PrimitiveValue::from(c), PrimitiveValue::from(n)] {
            let text: String = value.convert()?;
            prop_assert_eq!(text, value.to_string());
        }
    }

    #[test]
    fn text_reads_as_bool_without_failing(text in ".{0,16}") {
        let expected = text.eq_ignore_ascii_case("true");
        prop_assert_eq!(PrimitiveValue::from_string(text).convert::<bool>()?, expected);
    }

    #[test]
    fn map_keeps_the_last_value_per_key(entries in proptest::collection::vec(("[a-d]", any::<i32>()), 0..32)) {
        let mut map = PrimitiveMap::new();
        let mut expected = std::collections::HashMap::new();
        for (key, value) in &entries {
            map.set(key.clone(), *value);
            expected.insert(key.clone(), *value);
        }
        prop_assert_eq!(map.len(), expected.len());
        for (key, value) in expected {
            prop_assert_eq!(map.get::<i64>(&key)?, i64::from(value));
        }
    }
}
