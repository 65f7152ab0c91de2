//! Numeric preprocessing pipeline: median imputation followed by standard scaling

use crate::error::{ExoError, Result};
use super::{imputer::MedianImputer, scaler::StandardScaler, FeatureStatistics};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Imputer and scaler fitted together on the same columns.
///
/// Statistics are frozen after `fit`; every later call to `transform`, including
/// single-row inference requests, applies exactly the same parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericPreprocessor {
    columns: Vec<String>,
    imputer: MedianImputer,
    scaler: StandardScaler,
    is_fitted: bool,
    /// Seconds spent in the last fit call
    fit_time: Option<f64>,
}

impl NumericPreprocessor {
    /// Create an unfitted preprocessor for the given ordered columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            imputer: MedianImputer::new(),
            scaler: StandardScaler::new(),
            is_fitted: false,
            fit_time: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let start = Instant::now();
        self.check_width(x)?;

        self.imputer.fit(x, &self.columns)?;
        // Scaler statistics are computed on imputed data
        let imputed = self.imputer.transform(x)?;
        self.scaler.fit(&imputed)?;

        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());
        tracing::debug!(
            n_rows = x.nrows(),
            n_features = x.ncols(),
            "Fitted numeric preprocessor"
        );
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(ExoError::ModelNotFitted);
        }
        self.check_width(x)?;

        let mut out = x.to_owned();
        self.imputer.transform_inplace(&mut out)?;
        self.scaler.transform_inplace(&mut out)?;
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Transform a single schema-ordered row
    pub fn transform_row(&self, row: &[f64]) -> Result<Array2<f64>> {
        let x = Array2::from_shape_vec((1, row.len()), row.to_vec())?;
        self.transform(&x)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    /// Frozen per-feature statistics, in column order
    pub fn statistics(&self) -> Vec<FeatureStatistics> {
        if !self.is_fitted {
            return Vec::new();
        }
        self.columns
            .iter()
            .zip(self.imputer.fill_values())
            .zip(self.scaler.params())
            .map(|((name, &median), params)| FeatureStatistics {
                name: name.clone(),
                median,
                mean: params.mean,
                std: params.scale,
            })
            .collect()
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.columns.len() {
            return Err(ExoError::ShapeError {
                expected: format!("{} columns", self.columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }
}
