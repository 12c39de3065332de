//! Unit tests for primitive value conversion.

use rstest::rstest;

use super::{PrimitiveMap, PrimitiveValue, PropertyError, TypeConversionError, ValueKind};

#[rstest]
#[case::byte_to_short(PrimitiveValue::Byte(7), 7i64)]
#[case::short_to_long(PrimitiveValue::Short(-300), -300i64)]
#[case::int_to_long(PrimitiveValue::Int(70_000), 70_000i64)]
#[case::long_exact(PrimitiveValue::Long(i64::MAX), i64::MAX)]
fn integers_widen_to_long(#[case] value: PrimitiveValue, #[case] expected: i64) {
    assert_eq!(value.convert::<i64>(), Ok(expected));
}

#[rstest]
#[case::long_to_int(PrimitiveValue::Long(1), ValueKind::Int)]
#[case::int_to_short(PrimitiveValue::Int(1), ValueKind::Short)]
#[case::short_to_byte(PrimitiveValue::Short(1), ValueKind::Byte)]
#[case::double_to_float(PrimitiveValue::Double(1.0), ValueKind::Float)]
fn narrowing_is_rejected(#[case] value: PrimitiveValue, #[case] target: ValueKind) {
    let err = match target {
        ValueKind::Int => value.convert::<i32>().err(),
        ValueKind::Short => value.convert::<i16>().err(),
        ValueKind::Byte => value.convert::<u8>().err(),
        ValueKind::Float => value.convert::<f32>().err(),
        _ => None,
    }
    .expect("narrowing should fail");
    assert_eq!(err.source_kind(), value.kind());
    assert_eq!(err.target_kind(), target);
}

#[test]
fn float_widens_to_double_exactly() {
    assert_eq!(PrimitiveValue::Float(1.5).convert::<f64>(), Ok(1.5));
}

#[test]
fn integers_do_not_cross_into_floating_point() {
    assert!(PrimitiveValue::Int(1).convert::<f64>().is_err());
    assert!(PrimitiveValue::Float(1.0).convert::<i64>().is_err());
}

#[test]
fn unparsable_string_reports_generic_error() {
    let err = PrimitiveValue::from_string("abc")
        .convert::<i32>()
        .expect_err("parse should fail");
    assert_eq!(err, TypeConversionError::new(ValueKind::String, ValueKind::Int));
    assert_eq!(err.to_string(), "Unsupported Type Conversion");
}

#[test]
fn wrong_kind_and_bad_parse_share_one_message() {
    let wrong_kind = PrimitiveValue::Bool(true)
        .convert::<i32>()
        .expect_err("bool is not numeric");
    let bad_parse = PrimitiveValue::from_string("1.5")
        .convert::<i32>()
        .expect_err("not an int");
    assert_eq!(wrong_kind.to_string(), bad_parse.to_string());
}

#[rstest]
#[case::bool(PrimitiveValue::Bool(false), "false")]
#[case::byte(PrimitiveValue::Byte(255), "255")]
#[case::char(PrimitiveValue::Char('x'), "x")]
#[case::short(PrimitiveValue::Short(-2), "-2")]
#[case::int(PrimitiveValue::Int(123), "123")]
#[case::long(PrimitiveValue::Long(-9_000_000_000), "-9000000000")]
#[case::float(PrimitiveValue::Float(1.5), "1.5")]
#[case::double(PrimitiveValue::Double(0.25), "0.25")]
#[case::string(PrimitiveValue::from_string(" spaced "), " spaced ")]
fn string_conversion_is_total(#[case] value: PrimitiveValue, #[case] expected: &str) {
    assert_eq!(value.convert::<String>().as_deref(), Ok(expected));
}

#[test]
fn string_parses_into_each_numeric_kind() {
    let text = PrimitiveValue::from_string("42");
    assert_eq!(text.convert::<u8>(), Ok(42));
    assert_eq!(text.convert::<i16>(), Ok(42));
    assert_eq!(text.convert::<i32>(), Ok(42));
    assert_eq!(text.convert::<i64>(), Ok(42));
    assert_eq!(text.convert::<f32>(), Ok(42.0));
    assert_eq!(text.convert::<f64>(), Ok(42.0));
    assert_eq!(text.convert::<char>(), Ok('*'));
}

#[rstest]
#[case("true", true)]
#[case("TRUE", true)]
#[case("false", false)]
#[case("yes", false)]
fn bool_reads_from_text(#[case] text: &str, #[case] expected: bool) {
    assert_eq!(PrimitiveValue::from_string(text).convert::<bool>(), Ok(expected));
}

#[test]
fn string_int_string_round_trip() {
    let n: i32 = PrimitiveValue::from_string("123")
        .convert()
        .expect("numeric string");
    assert_eq!(PrimitiveValue::from(n).convert::<String>().as_deref(), Ok("123"));
}

#[test]
fn map_reports_missing_and_mismatched_properties() {
    let mut props = PrimitiveMap::new();
    props.set("flag", true);
    assert_eq!(
        props.get::<i32>("absent"),
        Err(PropertyError::Missing("absent".to_owned()))
    );
    assert!(matches!(
        props.get::<i32>("flag"),
        Err(PropertyError::Conversion(_))
    ));
    assert_eq!(props.get::<bool>("flag"), Ok(true));
}

#[test]
fn map_collects_from_pairs() {
    let props: PrimitiveMap = [("a", 1i32), ("b", 2i32)].into_iter().collect();
    assert_eq!(props.len(), 2);
    let keys: Vec<&str> = props.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["a", "b"]);
}
