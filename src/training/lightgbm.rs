//! LightGBM-style multiclass gradient boosting with leaf-wise tree growth
//!
//! - Leaf-wise (best-first) tree growth instead of level-wise
//! - One tree per class per boosting round, softmax over the summed raw scores
//! - Initial raw score per class is the log of its (clamped) prior

use crate::error::{ExoError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Class weighting applied to gradients and hessians
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Weight each class by `n_samples / (n_classes * n_class_samples)`
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_leaves: usize,
    pub max_depth: Option<usize>,
    pub min_child_samples: usize,
    pub reg_lambda: f64,
    pub reg_alpha: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
    pub class_weight: Option<ClassWeight>,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            reg_lambda: 0.0,
            reg_alpha: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
            class_weight: None,
        }
    }
}

impl LightGBMConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_leaves(mut self, leaves: usize) -> Self {
        self.max_leaves = leaves;
        self
    }

    pub fn with_min_child_samples(mut self, n: usize) -> Self {
        self.min_child_samples = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn with_class_weight(mut self, weight: ClassWeight) -> Self {
        self.class_weight = Some(weight);
        self
    }

    pub fn validate(&self) -> Result<()> {
        fn invalid(name: &str, value: impl ToString, reason: &str) -> ExoError {
            ExoError::InvalidParameter {
                name: name.to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", self.n_estimators, "must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(invalid("learning_rate", self.learning_rate, "must be positive"));
        }
        if self.max_leaves < 2 {
            return Err(invalid("max_leaves", self.max_leaves, "must be at least 2"));
        }
        if self.reg_lambda < 0.0 || self.reg_alpha < 0.0 {
            return Err(invalid(
                "reg_lambda/reg_alpha",
                format!("{}/{}", self.reg_lambda, self.reg_alpha),
                "must be non-negative",
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", self.subsample, "must be in (0, 1]"));
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return Err(invalid("colsample_bytree", self.colsample_bytree, "must be in (0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum LGBNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<LGBNode>,
        right: Box<LGBNode>,
    },
}

impl LGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            LGBNode::Leaf { value } => *value,
            LGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            LGBNode::Leaf { .. } => 1,
            LGBNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

// ---- Tree building utilities ----

fn compute_leaf_weight(g: f64, h: f64, lambda: f64, alpha: f64) -> f64 {
    let g_adj = if g.abs() <= alpha { 0.0 } else { g - alpha * g.signum() };
    -g_adj / (h + lambda)
}

fn compute_gain_single(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn make_leaf(gradients: &[f64], hessians: &[f64], indices: &[usize], lambda: f64, alpha: f64) -> LGBNode {
    let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    LGBNode::Leaf { value: compute_leaf_weight(g, h, lambda, alpha) }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_indices: Vec<usize>,
    right_indices: Vec<usize>,
}

fn find_best_split_for_feature(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    feature: usize,
    reg_lambda: f64,
    min_child_samples: usize,
) -> Option<SplitCandidate> {
    if indices.len() < 2 {
        return None;
    }
    let mut sorted: Vec<(usize, f64)> = indices.iter().map(|&i| (i, x[[i, feature]])).collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let total_g: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hessians[i]).sum();
    let base_score = compute_gain_single(total_g, total_h, reg_lambda);

    let mut left_g = 0.0;
    let mut left_h = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;
    let mut best_pos = 0;

    for i in 0..sorted.len() - 1 {
        left_g += gradients[sorted[i].0];
        left_h += hessians[sorted[i].0];
        let right_g = total_g - left_g;
        let right_h = total_h - left_h;

        if i + 1 < min_child_samples || sorted.len() - i - 1 < min_child_samples {
            continue;
        }
        if sorted[i].1 == sorted[i + 1].1 {
            continue;
        }

        let gain = compute_gain_single(left_g, left_h, reg_lambda)
            + compute_gain_single(right_g, right_h, reg_lambda)
            - base_score;

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (sorted[i].1 + sorted[i + 1].1) / 2.0;
            best_pos = i + 1;
        }
    }

    if best_gain <= 0.0 || !best_gain.is_finite() {
        return None;
    }

    Some(SplitCandidate {
        feature,
        threshold: best_threshold,
        gain: best_gain,
        left_indices: sorted[..best_pos].iter().map(|&(i, _)| i).collect(),
        right_indices: sorted[best_pos..].iter().map(|&(i, _)| i).collect(),
    })
}

/// Best split over the candidate features, searched in parallel
fn best_split(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    features: &[usize],
    config: &LightGBMConfig,
) -> Option<SplitCandidate> {
    let candidates: Vec<SplitCandidate> = features
        .par_iter()
        .filter_map(|&feat| {
            find_best_split_for_feature(
                x,
                gradients,
                hessians,
                indices,
                feat,
                config.reg_lambda,
                config.min_child_samples,
            )
        })
        .collect();
    candidates
        .into_iter()
        .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(Ordering::Equal))
}

struct PendingSplit {
    node_id: usize,
    split: SplitCandidate,
}

impl PartialEq for PendingSplit {
    fn eq(&self, other: &Self) -> bool {
        self.split.gain == other.split.gain
    }
}
impl Eq for PendingSplit {}
impl PartialOrd for PendingSplit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingSplit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.split
            .gain
            .partial_cmp(&other.split.gain)
            .unwrap_or(Ordering::Equal)
            // Older nodes first on equal gain
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

enum NodeSlot {
    Leaf(Vec<usize>),
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Build one tree using the leaf-wise (best-first) strategy
fn build_lgb_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    config: &LightGBMConfig,
    rng: &mut Xoshiro256PlusPlus,
) -> LGBNode {
    if indices.len() < config.min_child_samples * 2 {
        return make_leaf(gradients, hessians, indices, config.reg_lambda, config.reg_alpha);
    }

    let n_features = x.ncols();
    let n_selected = ((n_features as f64 * config.colsample_bytree).ceil() as usize).clamp(1, n_features);
    let mut feature_indices: Vec<usize> = (0..n_features).collect();
    if n_selected < n_features {
        feature_indices.shuffle(rng);
        feature_indices.truncate(n_selected);
        feature_indices.sort_unstable();
    }

    let mut nodes: Vec<NodeSlot> = vec![NodeSlot::Leaf(indices.to_vec())];
    let mut depths: Vec<usize> = vec![0];
    let mut heap: BinaryHeap<PendingSplit> = BinaryHeap::new();
    let max_depth_limit = config.max_depth.unwrap_or(usize::MAX);

    if let Some(split) = best_split(x, gradients, hessians, indices, &feature_indices, config) {
        heap.push(PendingSplit { node_id: 0, split });
    }

    let mut n_leaves = 1usize;

    while n_leaves < config.max_leaves {
        let PendingSplit { node_id, split } = match heap.pop() {
            Some(p) if p.split.gain > 0.0 => p,
            _ => break,
        };
        let depth = depths[node_id];
        if depth >= max_depth_limit {
            continue;
        }

        let left_id = nodes.len();
        let right_id = left_id + 1;
        nodes.push(NodeSlot::Leaf(split.left_indices.clone()));
        nodes.push(NodeSlot::Leaf(split.right_indices.clone()));
        depths.push(depth + 1);
        depths.push(depth + 1);
        nodes[node_id] = NodeSlot::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        n_leaves += 1;

        if depth + 1 < max_depth_limit {
            for (child_id, child_indices) in
                [(left_id, &split.left_indices), (right_id, &split.right_indices)]
            {
                if child_indices.len() < config.min_child_samples * 2 {
                    continue;
                }
                if let Some(child_split) =
                    best_split(x, gradients, hessians, child_indices, &feature_indices, config)
                {
                    heap.push(PendingSplit { node_id: child_id, split: child_split });
                }
            }
        }
    }

    fn to_node(nodes: &[NodeSlot], idx: usize, g: &[f64], h: &[f64], lam: f64, alpha: f64) -> LGBNode {
        match &nodes[idx] {
            NodeSlot::Leaf(indices) => make_leaf(g, h, indices, lam, alpha),
            NodeSlot::Split { feature, threshold, left, right } => LGBNode::Split {
                feature: *feature,
                threshold: *threshold,
                left: Box::new(to_node(nodes, *left, g, h, lam, alpha)),
                right: Box::new(to_node(nodes, *right, g, h, lam, alpha)),
            },
        }
    }
    to_node(&nodes, 0, gradients, hessians, config.reg_lambda, config.reg_alpha)
}

/// Numerically stable softmax, in place
fn softmax(raw: &mut [f64]) {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in raw.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in raw.iter_mut() {
        *v /= sum;
    }
}

const PRIOR_EPS: f64 = 1e-15;

// ============ LightGBM Classifier ============

/// Multiclass gradient-boosted tree classifier.
///
/// Class indices are `0..n_classes`; the caller owns the mapping to label names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    n_classes: usize,
    n_features: usize,
    init_scores: Vec<f64>,
    /// One tree per class for every boosting round
    rounds: Vec<Vec<LGBNode>>,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            n_classes: 0,
            n_features: 0,
            init_scores: Vec::new(),
            rounds: Vec::new(),
        }
    }

    /// Fit on `x` with class indices `y` in `0..n_classes`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>, n_classes: usize) -> Result<()> {
        self.config.validate()?;
        let n = x.nrows();
        if n == 0 {
            return Err(ExoError::DataQuality("cannot fit on an empty dataset".into()));
        }
        if y.len() != n {
            return Err(ExoError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", y.len()),
            });
        }
        if n_classes < 2 {
            return Err(ExoError::InvalidParameter {
                name: "n_classes".into(),
                value: n_classes.to_string(),
                reason: "at least two classes are required".into(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ExoError::InvalidParameter {
                name: "y".into(),
                value: bad.to_string(),
                reason: format!("class index must be below {}", n_classes),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ExoError::DataQuality("classifier input contains non-finite values".into()));
        }

        let mut counts = vec![0usize; n_classes];
        for &c in y.iter() {
            counts[c] += 1;
        }
        let sample_weights: Vec<f64> = match self.config.class_weight {
            Some(ClassWeight::Balanced) => {
                let class_weights: Vec<f64> = counts
                    .iter()
                    .map(|&c| if c == 0 { 0.0 } else { n as f64 / (n_classes as f64 * c as f64) })
                    .collect();
                y.iter().map(|&c| class_weights[c]).collect()
            }
            None => vec![1.0; n],
        };

        self.n_classes = n_classes;
        self.n_features = x.ncols();
        self.init_scores = counts
            .iter()
            .map(|&c| (c as f64 / n as f64).clamp(PRIOR_EPS, 1.0 - PRIOR_EPS).ln())
            .collect();
        self.rounds = Vec::with_capacity(self.config.n_estimators);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let mut raw = Array2::from_shape_fn((n, n_classes), |(_, k)| self.init_scores[k]);

        for _ in 0..self.config.n_estimators {
            let mut proba = raw.clone();
            for mut row in proba.rows_mut() {
                if let Some(slice) = row.as_slice_mut() {
                    softmax(slice);
                }
            }

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = ((n as f64 * self.config.subsample).ceil() as usize).max(1);
                let mut idx: Vec<usize> = (0..n).collect();
                idx.shuffle(&mut rng);
                idx.truncate(k);
                idx
            } else {
                (0..n).collect()
            };

            let mut round = Vec::with_capacity(n_classes);
            for k in 0..n_classes {
                let mut gradients = Vec::with_capacity(n);
                let mut hessians = Vec::with_capacity(n);
                for i in 0..n {
                    let p = proba[[i, k]];
                    let target = if y[i] == k { 1.0 } else { 0.0 };
                    gradients.push((p - target) * sample_weights[i]);
                    hessians.push((p * (1.0 - p)).max(1e-16) * sample_weights[i]);
                }

                let tree = build_lgb_tree(x, &gradients, &hessians, &indices, &self.config, &mut rng);
                for (i, sample) in x.rows().into_iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(sample);
                }
                round.push(tree);
            }
            self.rounds.push(round);
        }

        tracing::debug!(
            n_samples = n,
            n_classes,
            n_rounds = self.rounds.len(),
            total_leaves = self.total_leaves(),
            "Fitted LightGBM classifier"
        );
        Ok(())
    }

    /// Arg-max class per row; the lowest index wins ties
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row)).collect())
    }

    /// Class probabilities, one row per sample, each row summing to 1
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut raw = self.predict_raw(x)?;
        for mut row in raw.rows_mut() {
            if let Some(slice) = row.as_slice_mut() {
                softmax(slice);
            }
        }
        Ok(raw)
    }

    fn predict_raw(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(ExoError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ExoError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut raw = Array2::from_shape_fn((x.nrows(), self.n_classes), |(_, k)| self.init_scores[k]);
        for (i, sample) in x.rows().into_iter().enumerate() {
            for round in &self.rounds {
                for (k, tree) in round.iter().enumerate() {
                    raw[[i, k]] += self.config.learning_rate * tree.predict(sample);
                }
            }
        }
        Ok(raw)
    }

    pub fn is_fitted(&self) -> bool {
        !self.rounds.is_empty()
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }

    fn total_leaves(&self) -> usize {
        self.rounds.iter().flatten().map(LGBNode::n_leaves).sum()
    }
}

/// Index of the largest value, first index on ties
pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    for (k, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = k;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Three well separated bands on the first feature
    fn make_multiclass_data() -> (Array2<f64>, Array1<usize>) {
        let n = 150;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                (i / 50) as f64 * 10.0 + (i % 50) as f64 / 50.0
            } else {
                ((i * 7) % 13) as f64
            }
        });
        let y = Array1::from_iter((0..n).map(|i| i / 50));
        (x, y)
    }

    fn small_config() -> LightGBMConfig {
        LightGBMConfig::default()
            .with_n_estimators(30)
            .with_max_leaves(8)
            .with_min_child_samples(2)
    }

    #[test]
    fn test_lightgbm_multiclass() {
        let (x, y) = make_multiclass_data();
        let mut model = LightGBMClassifier::new(small_config());
        model.fit(&x, &y, 3).unwrap();
        let preds = model.predict(&x).unwrap();
        let acc = preds.iter().zip(y.iter()).filter(|(p, t)| p == t).count() as f64 / 150.0;
        assert!(acc > 0.95, "Accuracy too low: {}", acc);
        assert_eq!(model.n_rounds(), 30);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = make_multiclass_data();
        let mut model = LightGBMClassifier::new(small_config());
        model.fit(&x, &y, 4).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 4);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
        // Class 3 never appears in training
        assert!(proba.column(3).iter().all(|&p| p < 0.01));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = make_multiclass_data();
        let config = small_config();
        let mut a = LightGBMClassifier::new(config.clone());
        let mut b = LightGBMClassifier::new(config);
        a.fit(&x, &y, 3).unwrap();
        b.fit(&x, &y, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_balanced_class_weight() {
        let x = Array2::from_shape_fn((60, 1), |(i, _)| i as f64);
        let y = Array1::from_iter((0..60).map(|i| if i < 50 { 0 } else { 1 }));
        let mut model = LightGBMClassifier::new(
            small_config().with_class_weight(ClassWeight::Balanced),
        );
        model.fit(&x, &y, 2).unwrap();
        assert_eq!(model.predict(&array![[55.0]]).unwrap()[0], 1);
    }

    #[test]
    fn test_argmax_first_index_wins_ties() {
        assert_eq!(argmax(array![0.25, 0.25, 0.25, 0.25].view()), 0);
        assert_eq!(argmax(array![0.1, 0.45, 0.45, 0.0].view()), 1);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let (x, y) = make_multiclass_data();
        let mut model = LightGBMClassifier::new(small_config());
        assert!(model.fit(&x, &y, 2).is_err());
        assert!(matches!(model.predict(&x), Err(ExoError::ModelNotFitted)));

        model.fit(&x, &y, 3).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0, 3.0]]),
            Err(ExoError::ShapeError { .. })
        ));

        let bad = LightGBMConfig { learning_rate: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}
