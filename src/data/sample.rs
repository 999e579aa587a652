use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::model::ReportDataset;
use crate::error::{InspectError, InspectResult};

// ---------------------------------------------------------------------------
// Seeded sampling
// ---------------------------------------------------------------------------

/// Draw `amount` distinct row indices out of `len`, in draw order.
///
/// The same `(len, amount, seed)` always yields the same indices.
pub fn sample_indices(len: usize, amount: usize, seed: u64) -> InspectResult<Vec<usize>> {
    if amount > len {
        return Err(InspectError::SampleTooLarge {
            requested: amount,
            available: len,
        });
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(rand::seq::index::sample(&mut rng, len, amount).into_vec())
}

/// Reproducible subset of `amount` rows.
pub fn sample_subset(
    dataset: &ReportDataset,
    amount: usize,
    seed: u64,
) -> InspectResult<ReportDataset> {
    let indices = sample_indices(dataset.len(), amount, seed)?;
    Ok(dataset.select(&indices))
}

// ---------------------------------------------------------------------------
// Train / test split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Test];
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test => write!(f, "test"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: ReportDataset,
    pub test: ReportDataset,
}

impl TrainTestSplit {
    pub fn get(&self, split: Split) -> &ReportDataset {
        match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        }
    }
}

/// Draw `num_train + num_test` rows with `seed`, permute them with
/// `split_seed` and cut: the first `num_test` rows form the test split.
pub fn train_test_split(
    dataset: &ReportDataset,
    num_train: usize,
    num_test: usize,
    seed: u64,
    split_seed: u64,
) -> InspectResult<TrainTestSplit> {
    let total = num_train
        .checked_add(num_test)
        .ok_or(InspectError::SampleTooLarge {
            requested: usize::MAX,
            available: dataset.len(),
        })?;
    let mut drawn = sample_indices(dataset.len(), total, seed)?;
    let mut rng = StdRng::seed_from_u64(split_seed);
    drawn.shuffle(&mut rng);

    let (test, train) = drawn.split_at(num_test);
    log::debug!(
        "Split {} drawn rows into {} train / {} test",
        drawn.len(),
        train.len(),
        test.len()
    );
    Ok(TrainTestSplit {
        train: dataset.select(train),
        test: dataset.select(test),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::model::ReportRecord;

    fn dataset(n: usize) -> ReportDataset {
        let records = (0..n)
            .map(|i| ReportRecord::new(format!("report {i}")))
            .collect();
        ReportDataset::from_records(records, Vec::new())
    }

    #[test]
    fn same_seed_same_subset() {
        let ds = dataset(500);
        let a = sample_subset(&ds, 40, 72).unwrap();
        let b = sample_subset(&ds, 40, 72).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn different_seed_changes_subset() {
        let a = sample_indices(500, 40, 72).unwrap();
        let b = sample_indices(500, 40, 73).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn indices_are_distinct_and_in_range() {
        let idx = sample_indices(50, 50, 1).unwrap();
        let unique: BTreeSet<usize> = idx.iter().copied().collect();
        assert_eq!(unique.len(), 50);
        assert!(idx.iter().all(|&i| i < 50));
    }

    #[test]
    fn oversized_sample_is_rejected() {
        let err = sample_indices(10, 11, 0).unwrap_err();
        assert!(matches!(
            err,
            InspectError::SampleTooLarge {
                requested: 11,
                available: 10
            }
        ));
    }

    #[test]
    fn split_is_disjoint_and_sized() {
        let ds = dataset(200);
        let split = train_test_split(&ds, 30, 10, 72, 40).unwrap();
        assert_eq!(split.train.len(), 30);
        assert_eq!(split.test.len(), 10);

        let train: BTreeSet<&str> = split.train.texts().collect();
        let test: BTreeSet<&str> = split.test.texts().collect();
        assert!(train.is_disjoint(&test));
    }

    #[test]
    fn split_is_reproducible() {
        let ds = dataset(200);
        let a = train_test_split(&ds, 30, 10, 72, 40).unwrap();
        let b = train_test_split(&ds, 30, 10, 72, 40).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(Split::Test), &b.test);
    }

    #[test]
    fn overflowing_counts_are_rejected() {
        let err = train_test_split(&dataset(3), usize::MAX, 1, 1, 2).unwrap_err();
        assert!(matches!(
            err,
            InspectError::SampleTooLarge {
                requested: usize::MAX,
                available: 3
            }
        ));
    }

    #[test]
    fn empty_sample_from_empty_dataset() {
        let ds = dataset(0);
        let split = train_test_split(&ds, 0, 0, 1, 2).unwrap();
        assert!(split.train.is_empty() && split.test.is_empty());
    }
}
