//! Stratified train/test splitting

use crate::error::{ExoError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Row indices of the two partitions, each in ascending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn test_len(&self) -> usize {
        self.test.len()
    }
}

/// Split row indices so that every class keeps its share in both partitions.
///
/// The test partition holds `ceil(n * test_fraction)` rows, allocated to classes
/// proportionally with largest-remainder rounding. Every class keeps at least one
/// training row. Classes with fewer than two members make the split impossible.
pub fn stratified_split(
    y: &Array1<usize>,
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ExoError::InvalidParameter {
            name: "test_fraction".into(),
            value: test_fraction.to_string(),
            reason: "must be in (0, 1)".into(),
        });
    }

    let n = y.len();
    let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in y.iter().enumerate() {
        class_indices
            .get_mut(label)
            .ok_or_else(|| ExoError::InvalidParameter {
                name: "y".into(),
                value: label.to_string(),
                reason: format!("class index must be below {}", n_classes),
            })?
            .push(i);
    }

    let present = class_indices.iter().filter(|c| !c.is_empty()).count();
    if present < 2 {
        return Err(ExoError::DataQuality(format!(
            "at least two distinct classes are required, found {}",
            present
        )));
    }
    if let Some(k) = class_indices.iter().position(|c| c.len() == 1) {
        return Err(ExoError::DataQuality(format!(
            "class {} has a single sample; stratified splitting needs at least two per class",
            k
        )));
    }

    let allocation = allocate_test_counts(&class_indices, n, test_fraction);

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n);
    let mut test = Vec::with_capacity(allocation.iter().sum());
    for (indices, &n_test) in class_indices.iter_mut().zip(&allocation) {
        indices.shuffle(&mut rng);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(SplitIndices { train, test })
}

/// Per-class test counts by largest remainder, capped at `class_size - 1`
fn allocate_test_counts(class_indices: &[Vec<usize>], n: usize, test_fraction: f64) -> Vec<usize> {
    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let caps: Vec<usize> = class_indices.iter().map(|c| c.len().saturating_sub(1)).collect();

    let quotas: Vec<f64> = class_indices
        .iter()
        .map(|c| n_test as f64 * c.len() as f64 / n as f64)
        .collect();
    let mut counts: Vec<usize> = quotas
        .iter()
        .zip(&caps)
        .map(|(&q, &cap)| (q.floor() as usize).min(cap))
        .collect();

    let mut order: Vec<usize> = (0..class_indices.len()).collect();
    // Largest fractional part first, lower class index on ties
    order.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(counts.iter().sum());
    while remaining > 0 {
        let mut progressed = false;
        for &k in &order {
            if remaining == 0 {
                break;
            }
            if counts[k] < caps[k] {
                counts[k] += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    counts
}

/// Gather the given rows of `x`
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

/// Gather the given labels
pub fn take_labels(y: &Array1<usize>, indices: &[usize]) -> Array1<usize> {
    indices.iter().map(|&i| y[i]).collect()
}
