use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::{error::AppError, types::Label};

/// An opaque binary predictor over an ordered numeric vector.
pub trait Classifier: Send + Sync {
    /// The input order the classifier was trained with.
    fn feature_names(&self) -> &[String];

    fn version(&self) -> &str;

    fn predict(&self, features: &[f64]) -> Result<Label, AppError>;
}

fn default_threshold() -> f64 {
    0.5
}

/// Logistic-regression weights exported as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub weights: Vec<f64>,
    pub feature_order: Vec<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub version: String,
}

impl LogisticModel {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let model = Self::from_json(&content)?;
        info!(
            "Loaded classifier {} from {} ({} features)",
            model.version,
            path.display(),
            model.feature_order.len()
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        let model: LogisticModel = serde_json::from_str(content)?;
        if model.weights.len() != model.feature_order.len() {
            return Err(AppError::ModelInference(format!(
                "model declares {} features but carries {} weights",
                model.feature_order.len(),
                model.weights.len()
            )));
        }
        Ok(model)
    }

    pub fn probability(&self, features: &[f64]) -> Result<f64, AppError> {
        if features.len() != self.weights.len() {
            return Err(AppError::ModelInference(format!(
                "expected {} features, got {}",
                self.weights.len(),
                features.len()
            )));
        }

        let z = self.intercept
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>();

        let probability = 1.0 / (1.0 + (-z).exp());
        if probability.is_nan() {
            return Err(AppError::ModelInference("score is not a number".to_string()));
        }
        Ok(probability)
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_order
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn predict(&self, features: &[f64]) -> Result<Label, AppError> {
        let probability = self.probability(features)?;
        Ok(Label::from_class((probability >= self.threshold) as u8))
    }
}
