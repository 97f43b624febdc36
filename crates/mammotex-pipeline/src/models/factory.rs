use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierModel;

/// Build a boxed classifier model from a `ModelConfig`.
pub fn build_model(params: &ModelConfig) -> Box<dyn ClassifierModel> {
    match params.model_type {
        ModelType::GBDT { .. } => Box::new(crate::models::gbdt::GBDTClassifier::new(params.clone())),

        #[cfg(feature = "linfa")]
        ModelType::Logistic { .. } => {
            Box::new(crate::models::logistic::LogisticClassifier::new(params.clone()))
        } // `ModelType` only contains the variants enabled by features, so the
          // arms above are exhaustive for the compiled enum.
    }
}
