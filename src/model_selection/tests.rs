pub(crate) use super::*;

fn entities(spec: &[(&str, usize)]) -> Vec<String> {
    spec.iter()
        .flat_map(|&(e, n)| std::iter::repeat(e.to_string()).take(n))
        .collect()
}

#[test]
fn test_entity_counts_order() {
    let rows = entities(&[("b", 2), ("a", 2), ("c", 5), ("d", 1)]);
    let ordered = entity_counts(&rows);
    assert_eq!(ordered, vec![("c", 5), ("a", 2), ("b", 2), ("d", 1)]);
}

#[test]
fn test_group_kfold_balances_rows() {
    let rows = entities(&[("a", 5), ("b", 4), ("c", 3), ("d", 2), ("e", 1)]);
    let folds = GroupKFold::new(2).split(&rows).expect("5 groups");
    // a(5)->0, b(4)->1, c(3)->1, d(2)->0, e(1)->0  => 8 / 7
    assert_eq!(folds[0].validation.len(), 8);
    assert_eq!(folds[1].validation.len(), 7);
}

#[test]
fn test_group_kfold_tie_goes_to_lowest_fold() {
    let rows = entities(&[("x", 1), ("y", 1), ("z", 1)]);
    let folds = GroupKFold::new(3).split(&rows).expect("3 groups");
    // equal counts are taken in key order: x, y, z
    assert_eq!(folds[0].validation, vec![0]);
    assert_eq!(folds[1].validation, vec![1]);
    assert_eq!(folds[2].validation, vec![2]);
}

#[test]
fn test_group_kfold_too_few_groups() {
    let rows = entities(&[("a", 3), ("b", 3)]);
    let err = GroupKFold::new(3).split(&rows).expect_err("2 groups < 3 folds");
    assert!(matches!(err, PipelineError::Configuration { .. }));
}

#[test]
fn test_group_kfold_rejects_single_split() {
    let rows = entities(&[("a", 1), ("b", 1)]);
    assert!(GroupKFold::new(1).split(&rows).is_err());
}

#[test]
fn test_split_rejects_bad_fraction() {
    let rows = entities(&[("a", 3), ("b", 3), ("c", 3)]);
    for frac in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
        let err = group_train_test_split(&rows, frac, 2, 0).expect_err("invalid fraction");
        assert!(
            matches!(err, PipelineError::Configuration { ref param, .. } if param == "test_fraction"),
            "fraction {frac} gave {err}"
        );
    }
}

#[test]
fn test_split_rejects_bad_n_splits() {
    let rows = entities(&[("a", 3), ("b", 3), ("c", 3)]);
    let err = group_train_test_split(&rows, 0.2, 1, 0).expect_err("n_splits 1");
    assert!(matches!(err, PipelineError::Configuration { ref param, .. } if param == "n_splits"));
}

#[test]
fn test_split_rejects_empty_table() {
    let rows: Vec<String> = Vec::new();
    assert!(group_train_test_split(&rows, 0.1, 2, 0).is_err());
}

#[test]
fn test_split_meets_test_budget() {
    let rows = entities(&[("a", 4), ("b", 3), ("c", 3), ("d", 2), ("e", 2), ("f", 1), ("g", 5)]);
    let total = rows.len();
    let result = group_train_test_split(&rows, 0.25, 3, 99).expect("valid");
    let min_test = (total as f64 * 0.25).ceil() as usize;
    assert!(result.test_indices.len() >= min_test);
    assert_eq!(result.train_indices.len() + result.test_indices.len(), total);
}

#[test]
fn test_oversized_entity_kept_whole() {
    // "big" alone exceeds the 10% budget; whichever entity is drawn stays whole.
    let rows = entities(&[("big", 50), ("s1", 2), ("s2", 2), ("s3", 2), ("s4", 2)]);
    let result = group_train_test_split(&rows, 0.1, 2, 3).expect("valid");
    for e in &result.test_entities {
        let in_test = result.test_indices.iter().filter(|&&i| &rows[i] == e).count();
        let total = rows.iter().filter(|r| *r == e).count();
        assert_eq!(in_test, total, "entity {e} was split");
    }
}

#[test]
fn test_fingerprint_changes_with_seed() {
    let rows: Vec<String> = (0..60).map(|i| format!("u{}", i % 20)).collect();
    let a = group_train_test_split(&rows, 0.2, 4, 1).expect("valid");
    let b = group_train_test_split(&rows, 0.2, 4, 1).expect("valid");
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint().len(), 64);

    let differs = (2..10).any(|seed| {
        group_train_test_split(&rows, 0.2, 4, seed)
            .map(|c| c.fingerprint() != a.fingerprint())
            .unwrap_or(false)
    });
    assert!(differs);
}
