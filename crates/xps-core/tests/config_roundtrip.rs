use std::fs;

use proptest::prelude::*;
use xps_core::{
    parse_literal, read_experiment_config, render_literal, write_experiment_config, ConfigFile,
    ParamSet, ParamValue, XpsError,
};

const SUITE: &str = "\
# experiment suite
[DEFAULT]
path = results
repetitions = 2
iterations = 3

[exp1]
alpha = [1, 2]
label = baseline

[exp2]
; overrides the default
repetitions = 5
experiment = list
alpha = (0.1, 0.2)
beta: ['a', 'b']
";

#[test]
fn sections_inherit_defaults_in_file_order() {
    let config = ConfigFile::parse(SUITE).expect("parse");
    let names: Vec<_> = config.section_names().collect();
    assert_eq!(names, ["exp1", "exp2"]);

    let exp1 = config.section("exp1").expect("exp1");
    assert_eq!(exp1.name().as_deref(), Some("exp1"));
    assert_eq!(exp1.repetitions(), Some(2));
    assert_eq!(exp1.get("alpha"), Some(&ParamValue::from(vec![1i64, 2])));
    assert_eq!(exp1.get("label"), Some(&ParamValue::Str("baseline".into())));

    let exp2 = config.section("exp2").expect("exp2");
    assert_eq!(exp2.repetitions(), Some(5));
    assert_eq!(exp2.experiment_mode().as_deref(), Some("list"));
    assert_eq!(exp2.sweep_axes(), ["alpha", "beta"]);
    assert_eq!(config.experiments().len(), 2);
}

#[test]
fn malformed_lines_are_config_errors() {
    let err = ConfigFile::parse("alpha = 1\n").expect_err("key before section");
    assert!(matches!(err, XpsError::Config(ref info) if info.code == "config-missing-section"));

    let err = ConfigFile::parse("[a]\njust text\n").expect_err("no delimiter");
    match err {
        XpsError::Config(info) => assert_eq!(info.context.get("line").map(String::as_str), Some("2")),
        other => panic!("unexpected {other:?}"),
    }

    let err = ConfigFile::parse("[a]\n[a]\n").expect_err("duplicate");
    assert!(matches!(err, XpsError::Config(_)));
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().expect("tmp");
    let err = ConfigFile::load(&dir.path().join("nope.cfg")).expect_err("missing");
    assert!(matches!(err, XpsError::Config(ref info) if info.code == "config-read"));
}

#[test]
fn experiment_record_round_trips() {
    let dir = tempfile::tempdir().expect("tmp");
    let params = ParamSet::new()
        .with("path", "results")
        .with("iterations", 3)
        .with("repetitions", 2)
        .with("alpha", 0.5)
        .with("label", "10")
        .with("axis", vec![1i64, 2, 3])
        .with("name", "exp1/alpha0.5");
    write_experiment_config(&params, dir.path()).expect("write");
    let text = fs::read_to_string(dir.path().join("experiment.cfg")).expect("read");
    assert!(text.starts_with("[exp1/alpha0.5]\n"));
    assert!(text.contains("label = '10'\n"));

    let restored = read_experiment_config(dir.path()).expect("restore");
    for (key, value) in params.iter() {
        assert_eq!(restored.get(key), Some(value), "key {key}");
    }
}

#[test]
fn reading_absent_record_is_not_found() {
    let dir = tempfile::tempdir().expect("tmp");
    let err = read_experiment_config(dir.path()).expect_err("absent");
    assert!(matches!(err, XpsError::NotFound(_)));
}

fn scalar() -> impl Strategy<Value = ParamValue> {
    prop_oneof![
        any::<i64>().prop_map(ParamValue::Int),
        (-1.0e6f64..1.0e6).prop_map(ParamValue::Float),
        any::<bool>().prop_map(ParamValue::Bool),
        "[a-zA-Z0-9_./-]{0,12}".prop_map(ParamValue::Str),
    ]
}

proptest! {
    #[test]
    fn rendered_scalars_parse_back(value in scalar()) {
        prop_assert_eq!(parse_literal(&render_literal(&value)), value);
    }

    #[test]
    fn rendered_numeric_sweeps_parse_back(values in prop::collection::vec(any::<i64>(), 0..8)) {
        let value = ParamValue::from(values);
        prop_assert_eq!(parse_literal(&render_literal(&value)), value);
    }
}
