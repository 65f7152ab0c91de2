//! Standard (z-score) scaling

use crate::error::{ExoError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column centering and scaling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    /// Population standard deviation, 1.0 for constant columns
    pub scale: f64,
}

/// Rescales each column to zero mean and unit variance: (x - mean) / std
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler. Input must not contain missing values.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(ExoError::DataQuality("cannot fit scaler on an empty matrix".into()));
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(ExoError::DataQuality(
                "scaler input contains missing values; impute first".into(),
            ));
        }

        let n = x.nrows() as f64;
        self.params = x
            .axis_iter(Axis(1))
            .map(|column| {
                let mean = column.sum() / n;
                let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                ScalerParams {
                    mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                }
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = x.to_owned();
        self.transform_inplace(&mut out)?;
        Ok(out)
    }

    pub fn transform_inplace(&self, x: &mut Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(ExoError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(ExoError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        for (mut column, p) in x.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| (v - p.mean) / p.scale);
        }
        Ok(())
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}
