//! Entity-grouped train/test splitting and group-aware K-fold.
//!
//! Every row carries an entity key. No entity is ever split between the train
//! and test partitions, nor between the train and validation halves of a fold.
//!
//! # Example
//!
//! ```
//! use cohortml::model_selection::group_train_test_split;
//!
//! let entities: Vec<String> = (0..40).map(|i| format!("user{}", i % 10)).collect();
//! let split = group_train_test_split(&entities, 0.1, 3, 1534).expect("valid parameters");
//! assert_eq!(split.folds.len(), 3);
//! assert_eq!(split.train_indices.len() + split.test_indices.len(), 40);
//! ```

use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

/// One train/validation split of the training partition.
///
/// Indices are positions within the training partition (0-based rows of the
/// training matrix), not rows of the source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// Fold number, `0..n_splits`
    pub index: usize,
    /// Rows used for fitting, ascending
    pub train: Vec<usize>,
    /// Held-out rows, ascending
    pub validation: Vec<usize>,
}

/// Output of [`group_train_test_split`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResult {
    /// Source-table rows in the training partition, ascending
    pub train_indices: Vec<usize>,
    /// Source-table rows in the test partition, ascending
    pub test_indices: Vec<usize>,
    /// Distinct training entities, sorted
    pub train_entities: Vec<String>,
    /// Test entities in the order they were drawn
    pub test_entities: Vec<String>,
    /// Group-aware folds over the training partition
    pub folds: Vec<Fold>,
}

impl PartitionResult {
    /// SHA-256 of the fold assignment, hex encoded.
    ///
    /// Two runs with the same table and seed produce the same fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for fold in &self.folds {
            hasher.update((fold.index as u64).to_le_bytes());
            hasher.update(b"T");
            for &i in &fold.train {
                hasher.update((i as u64).to_le_bytes());
            }
            hasher.update(b"V");
            for &i in &fold.validation {
                hasher.update((i as u64).to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Row count per entity, ordered by count descending then key ascending.
fn entity_counts<S: AsRef<str>>(entities: &[S]) -> Vec<(&str, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for e in entities {
        *counts.entry(e.as_ref()).or_insert(0) += 1;
    }
    let mut ordered: Vec<(&str, usize)> = counts.into_iter().collect();
    // stable sort keeps key order inside equal counts
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    ordered
}

/// K-fold iterator variant with non-overlapping groups.
///
/// Each group appears exactly once in a validation set. Groups are assigned
/// largest first to the fold with the fewest rows so far (ties go to the lowest
/// fold index), which keeps fold sizes balanced.
///
/// # Example
///
/// ```
/// use cohortml::model_selection::GroupKFold;
///
/// let groups = ["a", "a", "b", "c", "c", "c"];
/// let folds = GroupKFold::new(2).split(&groups).expect("3 groups >= 2 folds");
/// assert_eq!(folds[0].validation, vec![3, 4, 5]);
/// assert_eq!(folds[1].validation, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct GroupKFold {
    n_splits: usize,
}

impl GroupKFold {
    /// Create a new group K-fold cross-validator.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Number of folds.
    #[must_use]
    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate the folds for rows labelled by `groups`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `n_splits < 2` or there are fewer distinct
    /// groups than folds.
    pub fn split<S: AsRef<str>>(&self, groups: &[S]) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(PipelineError::configuration(
                "n_splits",
                self.n_splits,
                "greater than 1",
            ));
        }
        let ordered = entity_counts(groups);
        if ordered.len() < self.n_splits {
            return Err(PipelineError::configuration(
                "n_splits",
                self.n_splits,
                &format!(
                    "at most the number of distinct training entities ({})",
                    ordered.len()
                ),
            ));
        }

        let mut fold_rows = vec![0usize; self.n_splits];
        let mut fold_of: HashMap<&str, usize> = HashMap::with_capacity(ordered.len());
        for (entity, count) in ordered {
            let lightest = fold_rows
                .iter()
                .enumerate()
                .min_by_key(|&(i, &rows)| (rows, i))
                .map_or(0, |(i, _)| i);
            fold_rows[lightest] += count;
            fold_of.insert(entity, lightest);
        }

        let mut validation: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for (row, g) in groups.iter().enumerate() {
            if let Some(&f) = fold_of.get(g.as_ref()) {
                validation[f].push(row);
            }
        }

        Ok(validation
            .into_iter()
            .enumerate()
            .map(|(index, validation)| {
                let held_out: HashSet<usize> = validation.iter().copied().collect();
                let train = (0..groups.len()).filter(|i| !held_out.contains(i)).collect();
                Fold {
                    index,
                    train,
                    validation,
                }
            })
            .collect())
    }
}

/// Partition rows into train/test by entity, then fold the training partition.
///
/// Entities are ordered by row count (descending, ties by key), permuted with a
/// generator seeded from `seed`, and drawn into the test set until at least
/// `ceil(total_rows * test_fraction)` rows are held out. An entity is never
/// split, so the test set may overshoot the target.
///
/// # Errors
///
/// Returns `Configuration` if `test_fraction` is not in (0, 1), `n_splits < 2`,
/// the table is empty, or the training partition has fewer entities than folds.
pub fn group_train_test_split<S: AsRef<str>>(
    entities: &[S],
    test_fraction: f64,
    n_splits: usize,
    seed: u64,
) -> Result<PartitionResult> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::configuration(
            "test_fraction",
            test_fraction,
            "a value in (0, 1)",
        ));
    }
    if n_splits < 2 {
        return Err(PipelineError::configuration(
            "n_splits",
            n_splits,
            "greater than 1",
        ));
    }
    if entities.is_empty() {
        return Err(PipelineError::configuration(
            "rows",
            0,
            "a non-empty training table",
        ));
    }

    let total_rows = entities.len();
    let test_rows_min = (total_rows as f64 * test_fraction).ceil() as usize;

    let mut order = entity_counts(entities);
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut test_set: HashSet<&str> = HashSet::new();
    let mut test_entities = Vec::new();
    let mut held_out = 0usize;
    for &(entity, count) in &order {
        if held_out >= test_rows_min {
            break;
        }
        test_set.insert(entity);
        test_entities.push(entity.to_string());
        held_out += count;
    }

    let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
        (0..total_rows).partition(|&i| test_set.contains(entities[i].as_ref()));

    let mut train_entities: Vec<String> = order
        .iter()
        .filter(|(e, _)| !test_set.contains(e))
        .map(|(e, _)| (*e).to_string())
        .collect();
    train_entities.sort();

    info!(
        total_rows,
        test_rows_min,
        train_rows = train_indices.len(),
        train_entities = train_entities.len(),
        test_rows = test_indices.len(),
        test_entities = test_entities.len(),
        "partitioned rows by entity"
    );

    let train_groups: Vec<&str> = train_indices.iter().map(|&i| entities[i].as_ref()).collect();
    let folds = GroupKFold::new(n_splits).split(&train_groups)?;

    for fold in &folds {
        let entities_in = |rows: &[usize]| -> usize {
            rows.iter().map(|&r| train_groups[r]).collect::<HashSet<_>>().len()
        };
        info!(
            fold = fold.index,
            train_rows = fold.train.len(),
            train_entities = entities_in(&fold.train),
            validation_rows = fold.validation.len(),
            validation_entities = entities_in(&fold.validation),
            "fold sizes"
        );
    }

    let result = PartitionResult {
        train_indices,
        test_indices,
        train_entities,
        test_entities,
        folds,
    };
    info!(fingerprint = %result.fingerprint(), "group k-fold assignment");
    Ok(result)
}

#[cfg(test)]
mod tests;
#[cfg(test)]
#[path = "tests_group_split_contract.rs"]
mod tests_group_split_contract;
