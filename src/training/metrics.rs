//! Classification metrics on the held-out partition

use crate::schema::LabelMapping;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Unweighted or support-weighted average over classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageReport {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Evaluation of a fitted classifier against true labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    /// Per-class report keyed by label name, for every label in the mapping
    pub per_class: BTreeMap<String, ClassReport>,
    pub macro_avg: AverageReport,
    pub weighted_avg: AverageReport,
    /// Rows are true classes, columns are predicted classes, both in code order
    pub confusion_matrix: Vec<Vec<usize>>,
    pub n_samples: usize,
}

impl EvaluationMetrics {
    /// Compute metrics for class codes `y_true` against `y_pred`.
    /// Ratios with a zero denominator are reported as 0.
    pub fn compute(y_true: &Array1<usize>, y_pred: &Array1<usize>, mapping: &LabelMapping) -> Self {
        let k = mapping.len();
        let mut confusion = Array2::<usize>::zeros((k, k));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < k && p < k {
                confusion[[t, p]] += 1;
            }
        }

        let n = y_true.len();
        let correct: usize = (0..k).map(|c| confusion[[c, c]]).sum();
        let accuracy = ratio(correct, n);

        let mut per_class = BTreeMap::new();
        let mut reports = Vec::with_capacity(k);
        for (code, label) in mapping.labels().iter().enumerate() {
            let tp = confusion[[code, code]];
            let predicted: usize = confusion.column(code).sum();
            let support: usize = confusion.row(code).sum();
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            let report = ClassReport { precision, recall, f1_score, support };
            reports.push(report.clone());
            per_class.insert(label.clone(), report);
        }

        let macro_avg = AverageReport {
            precision: mean(reports.iter().map(|r| r.precision), k),
            recall: mean(reports.iter().map(|r| r.recall), k),
            f1_score: mean(reports.iter().map(|r| r.f1_score), k),
        };
        let total_support: usize = reports.iter().map(|r| r.support).sum();
        let weighted = |f: fn(&ClassReport) -> f64| -> f64 {
            if total_support == 0 {
                return 0.0;
            }
            reports.iter().map(|r| f(r) * r.support as f64).sum::<f64>() / total_support as f64
        };
        let weighted_avg = AverageReport {
            precision: weighted(|r| r.precision),
            recall: weighted(|r| r.recall),
            f1_score: weighted(|r| r.f1_score),
        };

        Self {
            accuracy,
            per_class,
            macro_avg,
            weighted_avg,
            confusion_matrix: confusion.outer_iter().map(|row| row.to_vec()).collect(),
            n_samples: n,
        }
    }

    /// Plain-text report with one line per class, in code order
    pub fn format_report(&self, mapping: &LabelMapping) -> String {
        let mut out = format!(
            "{:>16} {:>10} {:>10} {:>10} {:>8}\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for label in mapping.labels() {
            if let Some(r) = self.per_class.get(label) {
                out.push_str(&format!(
                    "{:>16} {:>10.2} {:>10.2} {:>10.2} {:>8}\n",
                    label, r.precision, r.recall, r.f1_score, r.support
                ));
            }
        }
        out.push_str(&format!(
            "\n{:>16} {:>10} {:>10} {:>10.2} {:>8}\n",
            "accuracy", "", "", self.accuracy, self.n_samples
        ));
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            out.push_str(&format!(
                "{:>16} {:>10.2} {:>10.2} {:>10.2} {:>8}\n",
                name, avg.precision, avg.recall, avg.f1_score, self.n_samples
            ));
        }
        out
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn mean(values: impl Iterator<Item = f64>, k: usize) -> f64 {
    if k == 0 {
        0.0
    } else {
        values.sum::<f64>() / k as f64
    }
}
