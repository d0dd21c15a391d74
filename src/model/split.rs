//! Stratified train/test split

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::ModelError;

/// Row indices of the two halves of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `ceil(test_size * n)` rows, keeping each label's share in both halves.
///
/// Per-label test counts are the floor of the proportional share, with the
/// leftover rows going to the labels with the largest fractional remainder.
pub fn stratified_split(y: &[u8], test_size: f64, seed: u64) -> Result<SplitIndices, ModelError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ModelError::InvalidParams(format!(
            "test_size={} should be strictly between 0 and 1",
            test_size
        )));
    }

    let n = y.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in y.iter().enumerate() {
        match label {
            0 | 1 => by_class[label as usize].push(i),
            other => return Err(ModelError::InvalidLabel(other as f64)),
        }
    }

    let least = by_class.iter().map(Vec::len).min().unwrap_or(0);
    if least < 2 {
        return Err(ModelError::InvalidParams(format!(
            "The least populated class in y has only {} member(s), which is too few. \
             The minimum number of groups for any class cannot be less than 2.",
            least
        )));
    }
    if n_train < 2 || n_test < 2 {
        return Err(ModelError::InvalidParams(format!(
            "test_size={} leaves {} train and {} test rows for {} samples",
            test_size, n_train, n_test, n
        )));
    }

    // Largest-remainder allocation of the test rows
    let shares: Vec<f64> = by_class
        .iter()
        .map(|members| n_test as f64 * members.len() as f64 / n as f64)
        .collect();
    let mut test_counts: Vec<usize> = shares.iter().map(|s| s.floor() as usize).collect();
    let mut leftover = n_test - test_counts.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..2).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.total_cmp(&ra)
    });
    for &class in order.iter().cycle() {
        if leftover == 0 {
            break;
        }
        if test_counts[class] < by_class[class].len() {
            test_counts[class] += 1;
            leftover -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for (class, members) in by_class.iter_mut().enumerate() {
        members.shuffle(&mut rng);
        let (held_out, kept) = members.split_at(test_counts[class]);
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}
