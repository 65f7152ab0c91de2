//! Median imputation of missing numeric values

use crate::error::{ExoError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Replaces `NaN` cells with the per-column median observed at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    fill_values: Vec<f64>,
    is_fitted: bool,
}

impl MedianImputer {
    pub fn new() -> Self {
        Self {
            fill_values: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the imputer. `columns` names the matrix columns for error reporting.
    pub fn fit(&mut self, x: &Array2<f64>, columns: &[String]) -> Result<&mut Self> {
        if columns.len() != x.ncols() {
            return Err(ExoError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut fill_values = Vec::with_capacity(x.ncols());
        for (column, name) in x.axis_iter(Axis(1)).zip(columns) {
            let median = median_ignoring_nan(column).ok_or_else(|| {
                ExoError::DataQuality(format!("feature '{}' has no observed values", name))
            })?;
            fill_values.push(median);
        }

        self.fill_values = fill_values;
        self.is_fitted = true;
        Ok(self)
    }

    /// Return a copy of `x` with missing cells filled
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = x.to_owned();
        self.transform_inplace(&mut out)?;
        Ok(out)
    }

    pub fn transform_inplace(&self, x: &mut Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(ExoError::ModelNotFitted);
        }
        if x.ncols() != self.fill_values.len() {
            return Err(ExoError::ShapeError {
                expected: format!("{} columns", self.fill_values.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        for (mut column, &fill) in x.axis_iter_mut(Axis(1)).zip(&self.fill_values) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        Ok(())
    }

    /// Learned per-column medians
    pub fn fill_values(&self) -> &[f64] {
        &self.fill_values
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

impl Default for MedianImputer {
    fn default() -> Self {
        Self::new()
    }
}

/// Median of the non-NaN values, averaging the two middle values for even counts
fn median_ignoring_nan(column: ArrayView1<f64>) -> Option<f64> {
    let mut values: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
