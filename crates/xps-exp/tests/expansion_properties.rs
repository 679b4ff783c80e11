use std::collections::BTreeSet;

use proptest::prelude::*;
use xps_core::{read_experiment_config, ParamSet, ParamValue, XpsError};
use xps_exp::{expand, expand_params};

fn base(name: &str) -> ParamSet {
    ParamSet::new()
        .with("iterations", 3)
        .with("repetitions", 2)
        .with("path", ".")
        .with("name", name)
}

#[test]
fn grid_names_follow_axis_order() {
    let set = base("exp1").with("alpha", vec![1, 2]);
    let expansion = expand_params(&[set.clone()]).expect("expand");
    let names: Vec<String> = expansion
        .experiments
        .iter()
        .filter_map(ParamSet::name)
        .collect();
    assert_eq!(names, vec!["exp1/alpha1", "exp1/alpha2"]);
    assert_eq!(expansion.parents, vec![set]);
    assert_eq!(expansion.experiments[1].get("alpha"), Some(&ParamValue::Int(2)));
}

#[test]
fn two_axes_join_tokens() {
    let set = base("exp")
        .with("alpha", vec![1, 2])
        .with("beta", vec![0.5, 1.0]);
    let names: Vec<String> = expand_params(&[set])
        .expect("expand")
        .experiments
        .iter()
        .filter_map(ParamSet::name)
        .collect();
    assert_eq!(
        names,
        vec![
            "exp/alpha1_beta0.5",
            "exp/alpha1_beta1.0",
            "exp/alpha2_beta0.5",
            "exp/alpha2_beta1.0",
        ]
    );
}

#[test]
fn scalar_sets_pass_through() {
    let set = base("plain").with("alpha", 0.1);
    let expansion = expand_params(&[set.clone()]).expect("expand");
    assert!(expansion.parents.is_empty());
    assert_eq!(expansion.experiments, vec![set]);
}

#[test]
fn single_mode_keeps_sequences() {
    let set = base("kept")
        .with("alpha", vec![1, 2, 3])
        .with("experiment", "single");
    let expansion = expand_params(&[set.clone()]).expect("expand");
    assert_eq!(expansion.experiments, vec![set]);
}

#[test]
fn unknown_mode_is_config_error() {
    let set = base("odd").with("alpha", vec![1, 2]).with("experiment", "spiral");
    let err = expand_params(&[set]).expect_err("mode");
    assert!(matches!(err, XpsError::Config(_)));
    assert_eq!(err.info().code, "unexpected-experiment-mode");
}

#[test]
fn list_mode_rejects_unequal_axes() {
    let set = base("zip")
        .with("alpha", vec![1, 2, 3])
        .with("beta", vec![1, 2])
        .with("experiment", "list");
    let err = expand_params(&[set]).expect_err("mismatch");
    assert_eq!(err.info().code, "list-length-mismatch");
}

#[test]
fn empty_axis_is_rejected() {
    let set = base("empty").with("alpha", ParamValue::List(Vec::new()));
    let err = expand_params(&[set]).expect_err("empty axis");
    assert_eq!(err.info().code, "empty-sweep-axis");
}

#[test]
fn strings_differing_in_special_characters_get_distinct_names() {
    let set = base("opt").with("label", vec!["run 1", "run1", "run_1"]);
    let names: Vec<String> = expand_params(&[set])
        .expect("expand")
        .experiments
        .iter()
        .filter_map(ParamSet::name)
        .collect();
    assert_eq!(names, vec!["opt/labelrun%201", "opt/labelrun1", "opt/labelrun%5F1"]);
}

#[test]
fn repeated_sweep_values_are_rejected() {
    let set = base("twice").with("alpha", vec![1, 1]);
    let err = expand_params(&[set]).expect_err("duplicate");
    assert_eq!(err.info().code, "duplicate-experiment-name");
}

#[test]
fn expand_persists_parent_record() {
    let tmp = tempfile::tempdir().expect("tmp");
    let root = tmp.path().to_str().expect("utf8 path");
    let set = base("exp1").with("path", root).with("alpha", vec![1, 2]);
    let children = expand(&[set.clone()]).expect("expand");
    assert_eq!(children.len(), 2);
    let stored = read_experiment_config(&tmp.path().join("exp1")).expect("parent record");
    assert_eq!(stored, set);
}

proptest! {
    #[test]
    fn grid_cardinality_is_product_of_axis_lengths(lengths in prop::collection::vec(1usize..5, 1..4)) {
        let mut set = base("grid");
        for (axis, len) in lengths.iter().enumerate() {
            let values: Vec<i64> = (0..*len as i64).collect();
            set.insert(format!("a{axis}"), values);
        }
        let experiments = expand_params(&[set]).expect("expand").experiments;
        let expected: usize = lengths.iter().product();
        prop_assert_eq!(experiments.len(), expected);
        let names: BTreeSet<String> = experiments.iter().filter_map(ParamSet::name).collect();
        prop_assert_eq!(names.len(), expected);
        for child in &experiments {
            prop_assert!(child.sweep_axes().is_empty());
        }
    }

    #[test]
    fn distinct_string_values_never_share_a_name(
        values in prop::collection::btree_set("[a-z _/%. -]{0,6}", 1..6)
    ) {
        let values: Vec<String> = values.into_iter().collect();
        let set = base("labels").with("label", values.clone());
        let experiments = expand_params(&[set]).expect("expand").experiments;
        let names: BTreeSet<String> = experiments.iter().filter_map(ParamSet::name).collect();
        prop_assert_eq!(names.len(), values.len());
    }

    #[test]
    fn list_mode_zips_by_position(len in 1usize..6, axes in 1usize..4) {
        let mut set = base("zip").with("experiment", "list");
        for axis in 0..axes {
            let values: Vec<i64> = (0..len as i64).map(|j| j * 10 + axis as i64).collect();
            set.insert(format!("k{axis}"), values);
        }
        let experiments = expand_params(&[set]).expect("expand").experiments;
        prop_assert_eq!(experiments.len(), len);
        for (j, child) in experiments.iter().enumerate() {
            for axis in 0..axes {
                let expected = ParamValue::Int(j as i64 * 10 + axis as i64);
                prop_assert_eq!(child.get(&format!("k{axis}")), Some(&expected));
            }
        }
    }
}
