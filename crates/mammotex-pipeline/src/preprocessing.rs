//! Column standardization for the tabular classifiers.
//!
//! A [`Scaler`] is fitted on the training matrix only and then applied to both
//! the training and the test matrix.

use anyhow::Result;
use ndarray::{Array2, Axis};

use crate::error::PipelineError;

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f32 = 1e-6;

    /// Fit on a matrix whose rows are samples and columns are features.
    pub fn fit(x: &Array2<f32>) -> Result<Self> {
        let (nrows, ncols) = x.dim();
        if nrows == 0 || ncols == 0 {
            return Err(PipelineError::EmptyInput(format!(
                "cannot fit a scaler on a {}x{} matrix",
                nrows, ncols
            ))
            .into());
        }

        let nrows_f = nrows as f32;
        let mean: Vec<f32> = x
            .axis_iter(Axis(1))
            .map(|col| col.sum() / nrows_f)
            .collect();
        let std: Vec<f32> = x
            .axis_iter(Axis(1))
            .zip(&mean)
            .map(|(col, &m)| {
                let var = col.fold(0.0f32, |acc, &v| acc + (v - m) * (v - m)) / nrows_f;
                var.sqrt().max(Self::MIN_STD)
            })
            .collect();

        Ok(Scaler { mean, std })
    }

    /// Standardize every row of `x` with the fitted statistics.
    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::ChannelMismatch {
                expected: self.mean.len(),
                found: x.ncols(),
            }
            .into());
        }
        let mut out = x.to_owned();
        for (mut col, (&m, &s)) in out.axis_iter_mut(Axis(1)).zip(self.mean.iter().zip(&self.std)) {
            col.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }
}

/// Fit a scaler and return the transformed matrix in one call.
pub fn fit_transform(x: &Array2<f32>) -> Result<(Scaler, Array2<f32>)> {
    let scaler = Scaler::fit(x)?;
    let transformed = scaler.transform(x)?;
    Ok((scaler, transformed))
}
