use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::PipelineError;
use crate::models::classifier_trait::ClassifierModel;

/// Gradient Boosting Decision Tree (GBDT) classifier
pub struct GBDTClassifier {
    model: Option<GBDT>,
    params: ModelConfig,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            model: None,
            params,
        }
    }

    fn to_data(x: &Array2<f32>, y: Option<&[i32]>) -> DataVec {
        x.rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| match y {
                // LogLikelyhood expects labels in {-1, 1}
                Some(y) => Data::new_training_data(row.to_vec(), 1.0, if y[i] == 1 { 1.0 } else { -1.0 }, None),
                None => Data::new_test_data(row.to_vec(), None),
            })
            .collect()
    }
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()> {
        if x.nrows() == 0 {
            return Err(PipelineError::EmptyInput("cannot fit GBDT on zero rows".to_string()).into());
        }
        if x.nrows() != y.len() {
            bail!("GBDT fit: {} rows but {} labels", x.nrows(), y.len());
        }

        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                let mut config = Config::new();

                config.set_feature_size(x.ncols());
                config.set_shrinkage(self.params.learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);

                let mut gbdt = GBDT::new(&config);
                let mut train_x = Self::to_data(x, Some(y));
                gbdt.fit(&mut train_x);

                log::debug!(
                    "Fitted GBDT on {} rows x {} columns ({} rounds, depth {})",
                    x.nrows(),
                    x.ncols(),
                    num_boost_round,
                    max_depth
                );
                self.model = Some(gbdt);
                Ok(())
            }
            #[cfg(feature = "linfa")]
            other => bail!("Expected ModelType::GBDT params, got {:?}", other),
        }
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::ModelNotFitted(self.name().to_string()))?;
        let test_x = Self::to_data(x, None);
        Ok(model.predict(&test_x))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::ModelNotFitted(self.name().to_string()))?;
        let path_str = path
            .to_str()
            .with_context(|| format!("Model path is not valid UTF-8: {}", path.display()))?;
        model
            .save_model(path_str)
            .map_err(|e| anyhow!("Failed to save GBDT model to {}: {}", path.display(), e))
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Array2<f32>, Vec<i32>) {
        let x = Array2::from_shape_fn((20, 3), |(r, c)| {
            let case = r % 2 == 0;
            match c {
                0 => if case { 2.0 + r as f32 * 0.01 } else { -2.0 - r as f32 * 0.01 },
                1 => 5.0,
                _ => (r % 5) as f32,
            }
        });
        let y = (0..20).map(|r| i32::from(r % 2 == 0)).collect();
        (x, y)
    }

    fn params() -> ModelConfig {
        ModelConfig::new(
            0.1,
            ModelType::GBDT {
                max_depth: 3,
                num_boost_round: 20,
                debug: false,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            },
        )
    }

    #[test]
    fn separable_data_is_learned() {
        let (x, y) = separable();
        let mut classifier = GBDTClassifier::new(params());
        classifier.fit(&x, &y).unwrap();

        let proba = classifier.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), y.len());
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(classifier.predict(&x).unwrap(), y);
    }

    #[test]
    fn predicting_before_fit_fails() {
        let (x, _) = separable();
        let classifier = GBDTClassifier::new(params());
        let err = classifier.predict_proba(&x).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ModelNotFitted(_))
        ));
    }

    #[test]
    fn fitted_model_is_saved() {
        let (x, y) = separable();
        let mut classifier = GBDTClassifier::new(params());
        classifier.fit(&x, &y).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gbdt.model");
        classifier.save(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
