use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::config::{ModelConfig, ModelType};
use crate::error::PipelineError;
use crate::models::classifier_trait::ClassifierModel;

/// L2-regularized binary logistic regression.
pub struct LogisticClassifier {
    model: Option<FittedLogisticRegression<f64, bool>>,
    params: ModelConfig,
}

/// On-disk form of a fitted model: one coefficient per input column.
#[derive(Serialize)]
struct LogisticArtifact<'a> {
    model: &'a str,
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LogisticClassifier {
    pub fn new(params: ModelConfig) -> Self {
        LogisticClassifier {
            model: None,
            params,
        }
    }

    fn fitted(&self) -> Result<&FittedLogisticRegression<f64, bool>> {
        self.model
            .as_ref()
            .ok_or_else(|| PipelineError::ModelNotFitted(self.name().to_string()).into())
    }
}

impl ClassifierModel for LogisticClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyInput("cannot fit logistic regression on zero rows".to_string()).into());
        }
        if x.nrows() != y.len() {
            bail!("logistic fit: {} rows but {} labels", x.nrows(), y.len());
        }

        let ModelType::Logistic {
            alpha,
            max_iterations,
            gradient_tolerance,
        } = &self.params.model_type
        else {
            bail!(
                "Expected ModelType::Logistic params, got {:?}",
                self.params.model_type
            );
        };

        // Cases are `true`, the larger class, so probabilities refer to cases.
        let targets: Array1<bool> = y.iter().map(|&l| l == 1).collect();
        let dataset = Dataset::new(x.mapv(f64::from), targets);

        let model = LogisticRegression::default()
            .alpha(*alpha)
            .max_iterations(*max_iterations)
            .gradient_tolerance(*gradient_tolerance)
            .fit(&dataset)
            .map_err(|e| anyhow!("Failed to fit logistic regression: {}", e))?;

        log::debug!(
            "Fitted logistic regression on {} rows x {} columns (alpha {})",
            x.nrows(),
            x.ncols(),
            alpha
        );
        self.model = Some(model);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        let model = self.fitted()?;
        let proba = model.predict_probabilities(&x.mapv(f64::from));
        Ok(proba.iter().map(|&p| p as f32).collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let model = self.fitted()?;
        let artifact = LogisticArtifact {
            model: self.name(),
            intercept: model.intercept(),
            coefficients: model.params().to_vec(),
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create model file: {}", path.display()))?;
        serde_json::to_writer_pretty(file, &artifact)
            .with_context(|| format!("Failed to write model file: {}", path.display()))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "logistic"
    }
}
