pub(crate) use super::*;

fn ranges() -> Vec<CohortRange> {
    vec![
        CohortRange::new("1-5", 1.0, 5.0),
        CohortRange::new("5-20", 5.0, 20.0),
        CohortRange::new("20-50", 20.0, 50.0),
        CohortRange::new("50-100", 50.0, 100.0),
        CohortRange::new("100+", 100.0, 1e10),
    ]
}

fn labels(groups: &[CohortStats]) -> Vec<&str> {
    groups.iter().map(|g| g.label.as_str()).collect()
}

#[test]
fn test_every_cohort_exercised() {
    let groups = aggregate(
        &[2.0, 7.0, 15.0, 60.0, 150.0],
        &[0.1, 0.2, 0.3, 0.4, 0.5],
        &ranges(),
    )
    .expect("same length");
    assert_eq!(labels(&groups), vec!["1-5", "5-20", "20-50", "50-100", "100+"]);
    assert_eq!(
        groups.iter().map(|g| g.count).collect::<Vec<_>>(),
        vec![1, 2, 0, 1, 1]
    );
}

#[test]
fn test_one_row_per_cohort() {
    let groups = aggregate(
        &[2.0, 7.0, 25.0, 60.0, 150.0],
        &[0.1, 0.2, 0.3, 0.4, 0.5],
        &ranges(),
    )
    .expect("same length");
    assert_eq!(groups.len(), 5);
    for (g, p) in groups.iter().zip([0.1f32, 0.2, 0.3, 0.4, 0.5]) {
        assert_eq!(g.count, 1);
        assert_eq!(g.mean, Some(f64::from(p)));
        assert_eq!(g.pct10, Some(f64::from(p)));
        assert_eq!(g.pct90, Some(f64::from(p)));
    }
}

#[test]
fn test_trailing_empty_cohorts_dropped() {
    let groups = aggregate(&[2.0], &[0.3], &ranges()).expect("same length");
    assert_eq!(labels(&groups), vec!["1-5"]);
}

#[test]
fn test_leading_empty_cohorts_kept() {
    let groups = aggregate(&[150.0], &[0.9], &ranges()).expect("same length");
    assert_eq!(groups.len(), 5);
    assert_eq!(
        groups.iter().map(|g| g.count).collect::<Vec<_>>(),
        vec![0, 0, 0, 0, 1]
    );
    assert_eq!(groups[0].mean, None);
    assert_eq!(groups[0].value_generated, 0.0);
    assert!(groups[0].value_generated.is_sign_positive());
}

#[test]
fn test_empty_input_yields_no_cohorts() {
    let groups = aggregate(&[], &[], &ranges()).expect("same length");
    assert!(groups.is_empty());
}

#[test]
fn test_bounds_are_half_open() {
    let groups = aggregate(&[1.0, 5.0, 0.5], &[0.1, 0.2, 0.3], &ranges()).expect("same length");
    assert_eq!(groups[0].count, 1);
    assert_eq!(groups[1].count, 1);
    assert_eq!(groups.len(), 2);
}

#[test]
fn test_prediction_and_value_statistics() {
    let values = [10.0, 12.0, 14.0, 16.0];
    let preds = [0.1, 0.2, 0.3, 0.4];
    let groups = aggregate(&values, &preds, &ranges()).expect("same length");
    let g = &groups[1];
    assert_eq!(g.count, 4);
    assert!((g.mean.expect("non-empty") - 0.25).abs() < 1e-6);
    assert!((g.median.expect("non-empty") - 0.25).abs() < 1e-6);
    // R-7: h = 3 * 0.25 = 0.75 -> 0.1 + 0.75 * 0.1
    assert!((g.pct25.expect("non-empty") - 0.175).abs() < 1e-6);
    assert!((g.pct75.expect("non-empty") - 0.325).abs() < 1e-6);
    assert_eq!(g.value_generated, 52.0);
    assert_eq!(g.value_generated_mean, Some(13.0));
    assert_eq!(g.value_generated_median, Some(13.0));
}

#[test]
fn test_nan_predictions_skipped_in_statistics_but_counted() {
    let groups = aggregate(&[2.0, 3.0], &[f32::NAN, 0.4], &ranges()).expect("same length");
    assert_eq!(groups[0].count, 2);
    assert!((groups[0].mean.expect("one finite") - 0.4).abs() < 1e-6);
}

#[test]
fn test_length_mismatch() {
    let err = aggregate(&[1.0, 2.0], &[0.1], &ranges()).expect_err("mismatch");
    assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
}

#[test]
fn test_user_probas_excludes_nan() {
    let probas = user_probas(&["0xa", "0xb", "0xc"], &[0.25, f32::NAN, 0.75]).expect("same length");
    assert_eq!(probas.len(), 2);
    assert_eq!(probas.get("0xa"), Some(&0.25));
    assert!(!probas.contains_key("0xb"));
    assert!(probas.values().all(|v| !v.is_nan()));
}

#[test]
fn test_user_probas_exact_values_last_row_wins() {
    let p = 0.123_456_79f32;
    let probas = user_probas(&["0xa", "0xa"], &[0.5, p]).expect("same length");
    assert_eq!(probas["0xa"], f64::from(p));
}

#[test]
fn test_prod_data_json_schema() {
    let data = ProdData::build(
        &["0xa", "0xb"],
        &[3.0, 250.0],
        &[0.2, f32::NAN],
        &default_ranges(),
    )
    .expect("same length");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("prod_data.json");
    data.save_json(&path).expect("write");

    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.contains(r#""mean": NaN"#), "{text}");
    let value: serde_json::Value = serde_json::from_str(&nan_tokens_to_null(&text)).expect("json");
    assert_eq!(value["user_probas"].as_object().map(|m| m.len()), Some(1));
    let groups = value["user_groups"].as_array().expect("array");
    assert_eq!(groups.len(), 5);
    let keys: Vec<&str> = groups[0]
        .as_object()
        .expect("object")
        .keys()
        .map(String::as_str)
        .collect();
    for field in [
        "label",
        "lower",
        "higher",
        "count",
        "mean",
        "median",
        "pct25",
        "pct75",
        "pct10",
        "pct90",
        "value_generated",
        "value_generated_mean",
        "value_generated_median",
    ] {
        assert!(keys.contains(&field), "missing {field}");
    }
    assert_eq!(groups[0]["label"], "1 - 5");
    assert_eq!(groups[0]["count"], 1);
    // the "100+" cohort holds only a NaN prediction
    assert!(groups[4]["mean"].is_null());
    assert_eq!(groups[4]["value_generated"], 250.0);
    assert!(groups[1]["value_generated"].as_f64().is_some_and(f64::is_sign_positive));

    let back = ProdData::load_json(&path).expect("read back");
    assert_eq!(back, data);
}

#[test]
fn test_nan_tokens_inside_strings_untouched() {
    let text = r#"{"NaN": [NaN, 1.0], "a\"NaN": NaN}"#;
    assert_eq!(
        nan_tokens_to_null(text),
        r#"{"NaN": [null, 1.0], "a\"NaN": null}"#
    );
}

#[test]
fn test_python_layout() {
    let data = ProdData::build(&["0xa"], &[2.0], &[0.5], &default_ranges()).expect("same length");
    let text = data.to_json_string().expect("serialize");
    assert!(
        text.starts_with(r#"{"user_probas": {"0xa": 0.5}, "user_groups": [{"label": "1 - 5", "#),
        "{text}"
    );
    assert_eq!(ProdData::from_json_str(&text).expect("parse"), data);
}

#[test]
fn test_range_serde_uses_higher() {
    let json = serde_json::to_string(&CohortRange::new("x", 1.0, 2.0)).expect("serialize");
    assert_eq!(json, r#"{"label":"x","lower":1.0,"higher":2.0}"#);
}
