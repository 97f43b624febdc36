use std::path::Path;

use anyhow::Result;
use ndarray::Array2;

/// Probability threshold separating predicted cases from predicted controls.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// A small trait abstraction for the binary case/control classifiers run by the
/// evaluation harness. Labels use the crate convention (1 for case, 0 for control).
pub trait ClassifierModel {
    /// Fit the model on training rows only.
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()>;

    /// Predicted probability of being a case, one value per row.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Vec<f32>>;

    /// Hard 0/1 predictions at [`DECISION_THRESHOLD`].
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<i32>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| i32::from(p >= DECISION_THRESHOLD))
            .collect())
    }

    /// Persist the fitted model to `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Short identifier used in reports and artifact file names.
    fn name(&self) -> &str {
        "classifier"
    }
}
