//! Principal component projection ahead of the classifiers.
use anyhow::{anyhow, bail, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::Array2;

use crate::error::PipelineError;

pub struct PcaProjection {
    n_components: usize,
    model: Option<Pca<f64>>,
}

impl PcaProjection {
    pub fn new(n_components: usize) -> Self {
        PcaProjection {
            n_components,
            model: None,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Learn the leading `n_components` directions of `x`.
    pub fn fit(&mut self, x: &Array2<f32>) -> Result<()> {
        let limit = x.nrows().min(x.ncols());
        if self.n_components == 0 || self.n_components > limit {
            bail!(
                "cannot keep {} principal components of a {} x {} matrix",
                self.n_components,
                x.nrows(),
                x.ncols()
            );
        }
        let dataset = DatasetBase::from(x.mapv(f64::from));
        let model = Pca::params(self.n_components)
            .fit(&dataset)
            .map_err(|e| anyhow!("Failed to fit PCA: {}", e))?;
        log::debug!(
            "PCA projected {} columns onto {} components",
            x.ncols(),
            self.n_components
        );
        self.model = Some(model);
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::ModelNotFitted("pca".to_string()))?;
        let projected: Array2<f64> = model.predict(&x.mapv(f64::from));
        Ok(projected.mapv(|v| v as f32))
    }
}
