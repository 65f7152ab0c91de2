//! Preprocessing and classification composed into one fitted unit

use crate::error::{ExoError, Result};
use crate::preprocessing::NumericPreprocessor;
use crate::training::lightgbm::{argmax, LightGBMClassifier, LightGBMConfig};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fitted preprocessing followed by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPipeline {
    preprocessor: NumericPreprocessor,
    classifier: LightGBMClassifier,
}

impl ClassificationPipeline {
    /// Fit both stages on schema-ordered `x` and class codes `y`
    pub fn fit(
        columns: Vec<String>,
        x: &Array2<f64>,
        y: &Array1<usize>,
        n_classes: usize,
        config: &LightGBMConfig,
    ) -> Result<Self> {
        let mut preprocessor = NumericPreprocessor::new(columns);
        let x_scaled = preprocessor.fit_transform(x)?;

        let mut classifier = LightGBMClassifier::new(config.clone());
        classifier.fit(&x_scaled, y, n_classes)?;

        Ok(Self { preprocessor, classifier })
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let x_scaled = self.preprocessor.transform(x)?;
        self.classifier.predict_proba(&x_scaled)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let x_scaled = self.preprocessor.transform(x)?;
        self.classifier.predict(&x_scaled)
    }

    /// Class code and probability vector for one schema-ordered row
    pub fn predict_row(&self, row: &[f64]) -> Result<(usize, Vec<f64>)> {
        let x_scaled = self.preprocessor.transform_row(row)?;
        let proba = self.classifier.predict_proba(&x_scaled)?;
        let probs = proba.row(0);
        Ok((argmax(probs), probs.to_vec()))
    }

    pub fn preprocessor(&self) -> &NumericPreprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &LightGBMClassifier {
        &self.classifier
    }

    pub fn n_features(&self) -> usize {
        self.preprocessor.n_features()
    }

    pub fn n_classes(&self) -> usize {
        self.classifier.n_classes()
    }

    /// Check that both stages are fitted and agree on the input width
    pub fn validate(&self) -> Result<()> {
        if !self.preprocessor.is_fitted() || !self.classifier.is_fitted() {
            return Err(ExoError::ModelNotFitted);
        }
        if self.preprocessor.n_features() != self.classifier.n_features() {
            return Err(ExoError::ShapeError {
                expected: format!("{} classifier features", self.classifier.n_features()),
                actual: format!("{} preprocessed features", self.preprocessor.n_features()),
            });
        }
        Ok(())
    }
}
