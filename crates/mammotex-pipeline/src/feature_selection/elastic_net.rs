use anyhow::{anyhow, bail, Result};
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2, Axis};

use crate::config::ElasticNetSelection;
use crate::error::PipelineError;

/// Coefficients at or below this magnitude count as eliminated.
const ZERO_COEFFICIENT: f64 = 1e-10;

/// Keeps the columns an elastic-net regression on the 0/1 label leaves
/// with a non-zero coefficient.
pub struct ElasticNetSelector {
    params: ElasticNetSelection,
    selected: Option<Vec<usize>>,
}

impl ElasticNetSelector {
    pub fn new(params: ElasticNetSelection) -> Self {
        ElasticNetSelector {
            params,
            selected: None,
        }
    }

    /// Selected column indices in ascending order, once fitted.
    pub fn selected(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }

    pub fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<&[usize]> {
        if x.nrows() != y.len() {
            bail!("elastic net fit: {} rows but {} labels", x.nrows(), y.len());
        }
        let targets: Array1<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let dataset = Dataset::new(x.mapv(f64::from), targets);

        let model = ElasticNet::<f64>::params()
            .penalty(self.params.penalty)
            .l1_ratio(self.params.l1_ratio)
            .fit(&dataset)
            .map_err(|e| anyhow!("Failed to fit elastic net: {}", e))?;

        let selected: Vec<usize> = model
            .hyperplane()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.abs() > ZERO_COEFFICIENT)
            .map(|(i, _)| i)
            .collect();
        if selected.is_empty() {
            return Err(PipelineError::EmptyInput(format!(
                "elastic net with penalty {} removed every column",
                self.params.penalty
            ))
            .into());
        }

        log::debug!(
            "Elastic net kept {} of {} columns: {:?}",
            selected.len(),
            x.ncols(),
            selected
        );
        Ok(self.selected.insert(selected).as_slice())
    }

    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let selected = self
            .selected
            .as_ref()
            .ok_or_else(|| PipelineError::ModelNotFitted("elastic_net".to_string()))?;
        if let Some(&out_of_range) = selected.iter().find(|&&c| c >= x.ncols()) {
            return Err(PipelineError::ChannelMismatch {
                expected: out_of_range + 1,
                found: x.ncols(),
            }
            .into());
        }
        Ok(x.select(Axis(1), selected))
    }
}
