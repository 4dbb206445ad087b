// Deterministic train/test partitioning of the joined record set.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{CalorieError, Result};
use crate::preprocess::Record;

/// Disjoint, exhaustive train/test subsets.
#[derive(Debug, Clone)]
pub struct Partition {
    pub train: Vec<Record>,
    pub test: Vec<Record>,
}

/// Shuffled row indices split into (train, test). The test side gets
/// `ceil(n * test_fraction)` rows; both sides are non-empty.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(CalorieError::InvalidInput(format!(
            "test fraction must be in (0, 1), got {}", test_fraction
        )));
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n < 2 || n_test >= n {
        return Err(CalorieError::InsufficientData(format!(
            "{} record(s) cannot be split into non-empty train and test sets", n
        )));
    }

    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);
    let train = idx.split_off(n_test);
    Ok((train, idx))
}

/// Split `records` with a fixed seed. Same seed and input order give the same partition.
pub fn train_test_split(records: &[Record], test_fraction: f64, seed: u64) -> Result<Partition> {
    let (train_idx, test_idx) = split_indices(records.len(), test_fraction, seed)?;
    let pick = |ids: &[usize]| ids.iter().map(|&i| records[i].clone()).collect::<Vec<_>>();
    let partition = Partition { train: pick(&train_idx), test: pick(&test_idx) };
    debug!(
        train = partition.train.len(),
        test = partition.test.len(),
        seed,
        "Partitioned records"
    );
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{record, Gender};
    use std::collections::HashSet;

    #[test]
    fn indices_are_disjoint_and_exhaustive() {
        let (train, test) = split_indices(101, 0.2, 1).unwrap();
        assert_eq!(test.len(), 21);
        assert_eq!(train.len() + test.len(), 101);

        let a: HashSet<_> = train.iter().copied().collect();
        let b: HashSet<_> = test.iter().copied().collect();
        assert!(a.is_disjoint(&b));
        let all: HashSet<_> = a.union(&b).copied().collect();
        assert_eq!(all, (0..101).collect::<HashSet<_>>());
    }

    #[test]
    fn same_seed_same_partition() {
        assert_eq!(split_indices(50, 0.2, 7).unwrap(), split_indices(50, 0.2, 7).unwrap());
        assert_ne!(split_indices(50, 0.2, 7).unwrap(), split_indices(50, 0.2, 8).unwrap());
    }

    #[test]
    fn record_partition_covers_input() {
        let records: Vec<Record> = (0..10)
            .map(|i| record(Gender::Male, 20 + i, 180.0, 80.0, 10.0, 90.0, 39.0, i as f64))
            .collect();
        let p = train_test_split(&records, 0.2, 1).unwrap();
        assert_eq!(p.train.len(), 8);
        assert_eq!(p.test.len(), 2);
        let mut seen: Vec<f64> = p.train.iter().chain(&p.test).map(|r| r.calories).collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(split_indices(1, 0.2, 1), Err(CalorieError::InsufficientData(_))));
        assert!(matches!(split_indices(0, 0.2, 1), Err(CalorieError::InsufficientData(_))));
        assert!(matches!(split_indices(10, 0.0, 1), Err(CalorieError::InvalidInput(_))));
        assert!(matches!(split_indices(10, 1.0, 1), Err(CalorieError::InvalidInput(_))));
    }
}
