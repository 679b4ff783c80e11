use std::fs;
use std::path::{Path, PathBuf};

use xps_core::{write_experiment_config, ParamSet, ParamValue, XpsError};
use xps_exp::{
    aggregate_across_repetitions, histories_across_fixed_params, history, history_tags, mean,
    run, value, values_across_fixed_params, AggregationNote, Experiment, Row, RunOpts, Selection,
    TagSelector, Which,
};

fn experiment(root: &Path, name: &str, iterations: usize, repetitions: usize) -> PathBuf {
    let params = ParamSet::new()
        .with("iterations", iterations)
        .with("repetitions", repetitions)
        .with("path", root.to_str().expect("utf8 path"))
        .with("name", name);
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("dir");
    write_experiment_config(&params, &dir).expect("record");
    dir
}

fn write_log(dir: &Path, rep: usize, text: &str) {
    fs::write(dir.join(format!("{rep}.log")), text).expect("log");
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().copied().map(ParamValue::Float).collect()
}

struct Trace;

impl Experiment for Trace {
    fn iterate(&mut self, params: &ParamSet, rep: usize, n: usize) -> Result<Row, XpsError> {
        let alpha = params.get("alpha").and_then(ParamValue::as_f64).unwrap_or(0.0);
        let mut row = Row::new();
        row.insert("iteration".into(), ParamValue::from(n));
        row.insert("loss".into(), ParamValue::Float(alpha / (n as f64 + 1.0)));
        row.insert("phase".into(), ParamValue::from(if n % 2 == 0 { "even" } else { "odd" }));
        row.insert("rep".into(), ParamValue::from(rep));
        Ok(row)
    }
}

#[test]
fn history_reconstructs_written_rows() {
    let tmp = tempfile::tempdir().expect("tmp");
    let set = ParamSet::new()
        .with("iterations", 4)
        .with("repetitions", 1)
        .with("path", tmp.path().to_str().expect("utf8 path"))
        .with("alpha", 3.0)
        .with("name", "trace");
    run(|| Trace, &[set], &RunOpts { workers: 1, ..RunOpts::default() }).expect("run");
    let exp = tmp.path().join("trace");

    assert_eq!(history_tags(&exp, 0).expect("tags"), vec!["iteration", "loss", "phase", "rep"]);
    let all = history(&exp, 0, &TagSelector::All).expect("history").multi().expect("mapping");
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["iteration", "loss", "phase", "rep"]);
    assert_eq!(all["iteration"], (0..4).map(ParamValue::Int).collect::<Vec<_>>());
    assert_eq!(all["loss"], floats(&[3.0, 1.5, 1.0, 0.75]));
    assert_eq!(all["phase"][1], ParamValue::Str("odd".into()));

    let loss = history(&exp, 0, &TagSelector::from("loss")).expect("history");
    assert_eq!(loss, Selection::Single(floats(&[3.0, 1.5, 1.0, 0.75])));
}

#[test]
fn missing_log_yields_empty_results() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "quiet", 3, 1);
    assert_eq!(
        history(&exp, 0, &TagSelector::from("loss")).expect("history"),
        Selection::Single(Vec::new())
    );
    assert_eq!(
        history(&exp, 0, &TagSelector::All).expect("history"),
        Selection::Multi(Default::default())
    );
    assert_eq!(value(&exp, 0, &TagSelector::from("loss"), Which::Last).expect("value"), None);
}

#[test]
fn unknown_experiment_yields_empty_results() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = tmp.path().join("never_ran");
    assert_eq!(
        history(&exp, 0, &TagSelector::from("loss")).expect("history"),
        Selection::Single(Vec::new())
    );
    assert_eq!(
        history(&exp, 0, &TagSelector::All).expect("history"),
        Selection::Multi(Default::default())
    );
    assert_eq!(value(&exp, 0, &TagSelector::All, Which::Last).expect("value"), None);
}

#[test]
fn log_without_record_is_still_readable() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = tmp.path().join("loose");
    fs::create_dir_all(&exp).expect("dir");
    write_log(&exp, 0, "loss\n1.0\n");
    assert_eq!(
        history(&exp, 0, &TagSelector::from("loss")).expect("history"),
        Selection::Single(floats(&[1.0]))
    );
}

#[test]
fn aggregation_needs_the_experiment_record() {
    let tmp = tempfile::tempdir().expect("tmp");
    let err = aggregate_across_repetitions(&tmp.path().join("nope"), &TagSelector::All, mean)
        .expect_err("missing record");
    assert!(matches!(err, XpsError::NotFound(_)));
}

#[test]
fn value_reduces_history() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "exp", 3, 1);
    write_log(&exp, 0, "loss,acc\n3.0,0.1\n1.0,0.5\n2.0,0.4\n");
    let loss = TagSelector::from("loss");
    let reduce = |which: Which| value(&exp, 0, &loss, which).expect("value");
    assert_eq!(reduce(Which::Min), Some(Selection::Single(ParamValue::Float(1.0))));
    assert_eq!(reduce(Which::Max), Some(Selection::Single(ParamValue::Float(3.0))));
    assert_eq!(reduce(Which::Last), Some(Selection::Single(ParamValue::Float(2.0))));
    assert_eq!(reduce(Which::Index(0)), Some(Selection::Single(ParamValue::Float(3.0))));
    assert_eq!(reduce(Which::Index(7)), None);

    let both = TagSelector::Many(vec!["loss".into(), "acc".into()]);
    let best = value(&exp, 0, &both, Which::Max)
        .expect("value")
        .and_then(Selection::multi)
        .expect("mapping");
    assert_eq!(best["loss"], ParamValue::Float(3.0));
    assert_eq!(best["acc"], ParamValue::Float(0.5));
}

#[test]
fn aggregation_has_one_value_per_iteration() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "agg", 3, 3);
    write_log(&exp, 0, "loss\n1\n2\n3\n");
    write_log(&exp, 1, "loss\n3\n4\n5\n");
    write_log(&exp, 2, "loss\n5\n6\n7\n");
    let agg = aggregate_across_repetitions(&exp, &TagSelector::from("loss"), mean).expect("agg");
    assert_eq!(agg.values, Selection::Single(vec![3.0, 4.0, 5.0]));
    assert!(agg.notes.is_empty());
}

#[test]
fn empty_repetitions_are_dropped() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "agg", 3, 3);
    write_log(&exp, 0, "loss\n1\n2\n3\n");
    write_log(&exp, 1, "loss\n3\n4\n5\n");
    write_log(&exp, 2, "loss\n");
    let agg = aggregate_across_repetitions(&exp, &TagSelector::from("loss"), mean).expect("agg");
    assert_eq!(agg.values, Selection::Single(vec![2.0, 3.0, 4.0]));
    assert_eq!(
        agg.notes,
        vec![AggregationNote::Dropped {
            tag: "loss".into(),
            rep: 2
        }]
    );
}

#[test]
fn short_repetitions_truncate_the_result() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "agg", 3, 2);
    write_log(&exp, 0, "loss\n1\n2\n3\n");
    write_log(&exp, 1, "loss\n3\n");
    let agg = aggregate_across_repetitions(&exp, &TagSelector::All, mean).expect("agg");
    let values = agg.values.multi().expect("mapping");
    assert_eq!(values["loss"], vec![2.0]);
    assert!(matches!(agg.notes[0], AggregationNote::Truncated { rep: 1, len: 1, .. }));
}

#[test]
fn long_repetitions_are_cropped_to_iterations() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "agg", 2, 2);
    write_log(&exp, 0, "loss\n1\n2\n9\n");
    write_log(&exp, 1, "loss\n3\n4\n");
    let agg = aggregate_across_repetitions(&exp, &TagSelector::from("loss"), mean).expect("agg");
    assert_eq!(agg.values, Selection::Single(vec![2.0, 3.0]));
    assert_eq!(
        agg.notes,
        vec![AggregationNote::Cropped {
            tag: "loss".into(),
            rep: 0,
            len: 3
        }]
    );
}

#[test]
fn all_dropped_yields_empty_sequence() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "agg", 3, 2);
    let agg = aggregate_across_repetitions(&exp, &TagSelector::from("loss"), mean).expect("agg");
    assert_eq!(agg.values, Selection::Single(Vec::new()));
    assert_eq!(agg.notes.len(), 2);
}

#[test]
fn aggregation_rejects_text() {
    let tmp = tempfile::tempdir().expect("tmp");
    let exp = experiment(tmp.path(), "agg", 1, 1);
    write_log(&exp, 0, "phase\nwarmup\n");
    let err = aggregate_across_repetitions(&exp, &TagSelector::from("phase"), mean)
        .expect_err("text");
    assert!(matches!(err, XpsError::Validation(_)));
}

#[test]
fn fixed_params_slice_the_sweep() {
    let tmp = tempfile::tempdir().expect("tmp");
    let set = ParamSet::new()
        .with("iterations", 2)
        .with("repetitions", 1)
        .with("path", tmp.path().to_str().expect("utf8 path"))
        .with("alpha", vec![1.0, 2.0])
        .with("beta", vec![1, 10])
        .with("name", "sweep");
    run(|| Trace, &[set], &RunOpts { workers: 1, ..RunOpts::default() }).expect("run");
    let exp = tmp.path().join("sweep");

    let fixed = ParamSet::new().with("beta", 1);
    let values = values_across_fixed_params(&exp, 0, "loss", Which::Last, &fixed).expect("values");
    let dirs: Vec<PathBuf> = values.iter().map(|m| m.exp.clone()).collect();
    assert_eq!(
        dirs,
        vec![exp.join("alpha1.0_beta1"), exp.join("alpha2.0_beta1")]
    );
    assert_eq!(values[0].result, Some(ParamValue::Float(0.5)));
    assert_eq!(values[1].params.get("alpha"), Some(&ParamValue::Float(2.0)));

    let fixed = ParamSet::new().with("alpha", 2.0).with("beta", 10);
    let histories = histories_across_fixed_params(&exp, 0, "loss", &fixed).expect("histories");
    assert_eq!(histories.len(), 1);
    assert_eq!(histories[0].result, floats(&[2.0, 1.0]));
}
