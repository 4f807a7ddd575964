//! Coercion engine and specification validation tests.

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::value::{ApiData, CallArgs};

fn payload(value: Value) -> ApiData {
    match value {
        Value::Object(map) => map,
        other => panic!("test payload must be an object, got {other}"),
    }
}

fn single(kind: ArgumentKind) -> Vec<ArgumentSpec> {
    vec![ArgumentSpec::required("value", kind)]
}

#[fixture]
fn point_spec() -> Vec<ArgumentSpec> {
    vec![
        ArgumentSpec::required("label", ArgumentKind::String),
        ArgumentSpec::required(
            "point",
            ArgumentKind::nested([
                ArgumentSpec::required("x", ArgumentKind::Int),
                ArgumentSpec::required("y", ArgumentKind::Int),
            ]),
        ),
    ]
}

#[rstest]
#[case::integer(json!(7), 7)]
#[case::negative(json!(-12), -12)]
#[case::float_truncates(json!(3.9), 3)]
#[case::negative_float_truncates_toward_zero(json!(-3.9), -3)]
#[case::decimal_string(json!("42"), 42)]
#[case::signed_string(json!("-5"), -5)]
fn int_accepts_numeric_representations(#[case] raw: Value, #[case] expected: i64) {
    let args = parse(&single(ArgumentKind::Int), &payload(json!({"value": raw})))
        .expect("int should coerce");
    assert_eq!(args.int("value"), Some(expected));
}

#[rstest]
#[case::word(json!("forty"))]
#[case::float_string(json!("3.5"))]
#[case::boolean(json!(true))]
#[case::null(json!(null))]
#[case::list(json!([1, 2]))]
#[case::map(json!({"n": 1}))]
#[case::beyond_i64(json!(u64::MAX))]
#[case::huge_float(json!(1.0e300))]
fn int_rejects_other_representations(#[case] raw: Value) {
    let errors = parse(&single(ArgumentKind::Int), &payload(json!({"value": raw})))
        .expect_err("int should reject");
    assert_eq!(errors.len(), 1);
    assert!(
        errors[0].starts_with("Invalid value for value (expected int): "),
        "unexpected message: {}",
        errors[0]
    );
}

#[rstest]
#[case::integer(json!(9), 9)]
#[case::large(json!(u64::MAX), u64::MAX)]
#[case::float_truncates(json!(2.7), 2)]
#[case::string(json!("17"), 17)]
fn uint_accepts_non_negative_values(#[case] raw: Value, #[case] expected: u64) {
    let args = parse(&single(ArgumentKind::UInt), &payload(json!({"value": raw})))
        .expect("uint should coerce");
    assert_eq!(args.uint("value"), Some(expected));
}

#[rstest]
#[case::negative_integer(json!(-1))]
#[case::negative_float(json!(-0.5))]
#[case::negative_string(json!("-3"))]
#[case::word(json!("many"))]
fn uint_rejects_negative_and_non_integer_values(#[case] raw: Value) {
    let errors = parse(&single(ArgumentKind::UInt), &payload(json!({"value": raw})))
        .expect_err("uint should reject");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("(expected uint)"));
}

#[test]
fn float_accepts_float_representation() {
    let args = parse(&single(ArgumentKind::Float), &payload(json!({"value": 3.9})))
        .expect("float should coerce");
    assert_eq!(args.float("value"), Some(3.9));
}

#[test]
fn float_does_not_parse_strings() {
    let errors = parse(&single(ArgumentKind::Float), &payload(json!({"value": "3.9"})))
        .expect_err("string is not a float");
    assert_eq!(errors, vec!["Invalid value for value (expected float): 3.9"]);
}

#[test]
fn string_does_not_stringify_numbers() {
    let errors = parse(&single(ArgumentKind::String), &payload(json!({"value": 12})))
        .expect_err("number is not a string");
    assert_eq!(errors, vec!["Invalid value for value (expected string): 12"]);
}

#[rstest]
#[case::null(json!(null))]
#[case::list(json!([1, "two", {"three": 3}]))]
#[case::map(json!({"anything": true}))]
fn raw_passes_values_through(#[case] raw: Value) {
    let args = parse(&single(ArgumentKind::Raw), &payload(json!({"value": raw.clone()})))
        .expect("raw accepts anything");
    assert_eq!(args.raw("value"), Some(&raw));
}

#[test]
fn nested_values_are_coerced_recursively() {
    let spec = vec![ArgumentSpec::required(
        "point",
        ArgumentKind::nested([ArgumentSpec::required("x", ArgumentKind::Int)]),
    )];
    let args = parse(&spec, &payload(json!({"point": {"x": "42"}}))).expect("nested coerces");

    let expected = CallArgs::new().with("x", 42_i64);
    assert_eq!(args.nested("point"), Some(&expected));
}

#[rstest]
fn nested_failures_are_reported_per_leaf(point_spec: Vec<ArgumentSpec>) {
    let raw = payload(json!({"label": "a", "point": {"x": "left"}}));
    let errors = parse(&point_spec, &raw).expect_err("nested should fail");
    assert_eq!(
        errors,
        vec![
            "In point: Invalid value for x (expected int): left",
            "In point: Missing argument: y (int)",
        ]
    );
}

#[test]
fn deeply_nested_failures_carry_the_ancestor_path() {
    let spec = vec![ArgumentSpec::required(
        "outer",
        ArgumentKind::nested([ArgumentSpec::required(
            "inner",
            ArgumentKind::nested([ArgumentSpec::required("leaf", ArgumentKind::Float)]),
        )]),
    )];
    let errors = parse(&spec, &payload(json!({"outer": {"inner": {"leaf": 1}}})))
        .expect_err("leaf should fail");
    assert_eq!(
        errors,
        vec!["In outer: In inner: Invalid value for leaf (expected float): 1"]
    );
}

#[rstest]
fn nested_requires_a_map(point_spec: Vec<ArgumentSpec>) {
    let errors = parse(&point_spec, &payload(json!({"label": "a", "point": [1, 2]})))
        .expect_err("list is not nested");
    assert_eq!(errors, vec!["Invalid value for point (expected nested): [1,2]"]);
}

#[test]
fn every_invalid_argument_is_reported_in_spec_order() {
    let spec = vec![
        ArgumentSpec::required("a", ArgumentKind::Int),
        ArgumentSpec::required("b", ArgumentKind::String),
        ArgumentSpec::required("c", ArgumentKind::Float),
        ArgumentSpec::required("d", ArgumentKind::Raw),
    ];
    let raw = payload(json!({"c": "x", "a": "nope", "b": false, "d": 1}));
    let errors = parse(&spec, &raw).expect_err("three arguments are invalid");
    assert_eq!(
        errors,
        vec![
            "Invalid value for a (expected int): nope",
            "Invalid value for b (expected string): false",
            "Invalid value for c (expected float): x",
        ]
    );
}

#[test]
fn missing_required_argument_names_its_kind() {
    let errors = parse(&single(ArgumentKind::UInt), &ApiData::new()).expect_err("missing");
    assert_eq!(errors, vec!["Missing argument: value (uint)"]);
}

#[test]
fn defaults_fill_absent_arguments_unchanged() {
    let spec = vec![
        ArgumentSpec::required("limit", ArgumentKind::UInt).with_default(10_u64),
        ArgumentSpec::optional("prefix", ArgumentKind::String).with_default("log"),
    ];
    let args = parse(&spec, &ApiData::new()).expect("defaults apply");
    assert_eq!(args.uint("limit"), Some(10));
    assert_eq!(args.str("prefix"), Some("log"));
}

#[test]
fn supplied_values_override_defaults() {
    let spec = vec![ArgumentSpec::required("limit", ArgumentKind::Int).with_default(10_i64)];
    let args = parse(&spec, &payload(json!({"limit": 3}))).expect("value wins");
    assert_eq!(args.int("limit"), Some(3));
}

#[test]
fn absent_optional_arguments_are_omitted() {
    let spec = vec![
        ArgumentSpec::required("name", ArgumentKind::String),
        ArgumentSpec::optional("nickname", ArgumentKind::String),
    ];
    let args = parse(&spec, &payload(json!({"name": "ada"}))).expect("optional may be absent");
    assert_eq!(args.len(), 1);
    assert!(!args.contains("nickname"));
}

#[test]
fn undeclared_keys_are_ignored() {
    let spec = single(ArgumentKind::Int);
    let args = parse(&spec, &payload(json!({"value": 1, "extra": "x"}))).expect("parse");
    assert_eq!(args.len(), 1);
    assert!(!args.contains("extra"));
}

#[rstest]
fn parsing_is_repeatable(point_spec: Vec<ArgumentSpec>) {
    let good = payload(json!({"label": "p", "point": {"x": 1, "y": "2"}}));
    let bad = payload(json!({"point": {"x": true}}));
    assert_eq!(parse(&point_spec, &good), parse(&point_spec, &good));
    assert_eq!(parse(&point_spec, &bad), parse(&point_spec, &bad));
}

#[test]
fn positional_tokens_map_by_position() {
    let spec = vec![
        ArgumentSpec::required("a", ArgumentKind::Int),
        ArgumentSpec::required("b", ArgumentKind::String),
    ];
    let raw = positional_args(&spec, &["1", "two"]).expect("two tokens fit");
    assert_eq!(Value::Object(raw), json!({"a": "1", "b": "two"}));
}

#[test]
fn positional_tokens_beyond_the_spec_are_rejected() {
    let spec = vec![
        ArgumentSpec::required("a", ArgumentKind::Int),
        ArgumentSpec::required("b", ArgumentKind::Int),
    ];
    let error = positional_args(&spec, &["1", "2", "3"]).expect_err("too many");
    assert_eq!(error, "Too many arguments (expected at most 2, got 3)");
}

#[test]
fn spec_validation_accepts_well_formed_specs() {
    let spec = point_spec();
    assert_eq!(validate_spec(&spec), Ok(()));
}

#[test]
fn spec_validation_rejects_duplicate_names() {
    let spec = vec![
        ArgumentSpec::required("a", ArgumentKind::Int),
        ArgumentSpec::optional("a", ArgumentKind::String),
    ];
    assert_eq!(
        validate_spec(&spec),
        Err(SpecError::Duplicate {
            path: "a".to_owned()
        })
    );
}

#[test]
fn spec_validation_reports_nested_paths() {
    let spec = vec![ArgumentSpec::required(
        "point",
        ArgumentKind::nested([
            ArgumentSpec::required("x", ArgumentKind::Int),
            ArgumentSpec::required("x", ArgumentKind::Int),
        ]),
    )];
    assert_eq!(
        validate_spec(&spec),
        Err(SpecError::Duplicate {
            path: "point.x".to_owned()
        })
    );
}

#[test]
fn spec_validation_rejects_empty_names() {
    let spec = vec![
        ArgumentSpec::required("ok", ArgumentKind::Int),
        ArgumentSpec::required("  ", ArgumentKind::Int),
    ];
    assert_eq!(
        validate_spec(&spec),
        Err(SpecError::EmptyName {
            scope: "<root>".to_owned(),
            position: 1
        })
    );
}

#[rstest]
#[case::int_with_string(ArgumentKind::Int, ArgValue::from("3"))]
#[case::float_with_int(ArgumentKind::Float, ArgValue::Int(3))]
#[case::uint_with_int(ArgumentKind::UInt, ArgValue::Int(3))]
fn spec_validation_rejects_mistyped_defaults(#[case] kind: ArgumentKind, #[case] default: ArgValue) {
    let spec = vec![ArgumentSpec::optional("n", kind).with_default(default)];
    assert!(matches!(
        validate_spec(&spec),
        Err(SpecError::DefaultMismatch { .. })
    ));
}

#[test]
fn raw_arguments_accept_any_default() {
    let spec =
        vec![ArgumentSpec::optional("blob", ArgumentKind::Raw).with_default(ArgValue::Int(1))];
    assert_eq!(validate_spec(&spec), Ok(()));
}
