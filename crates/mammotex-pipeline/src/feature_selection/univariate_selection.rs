//! Univariate feature selection methods following scikit-learn's API.
//!
//! See: https://scikit-learn.org/stable/modules/feature_selection.html#univariate-feature-selection
//!
//! With a 0/1 target the F-statistic of the univariate regression equals the
//! one-way ANOVA F-statistic between cases and controls.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::PipelineError;

/// Compute row-wise (squared) Euclidean norms of a 2D array.
///
/// # Parameters
///
/// * `x` - A 2D array of shape (n_samples, n_features).
/// * `squared` - Return squared norms instead of norms.
pub fn row_norms<S>(x: &ArrayBase<S, Ix2>, squared: bool) -> Array1<f64>
where
    S: Data<Elem = f64>,
{
    x.axis_iter(Axis(0))
        .map(|row| {
            let sum_of_squares: f64 = row.iter().map(|&val| val.powi(2)).sum();
            if squared {
                sum_of_squares
            } else {
                sum_of_squares.sqrt()
            }
        })
        .collect()
}

/// Compute Pearson's r for each feature and the target.
///
/// # Parameters
///
/// * `x` - Data matrix of shape (n_samples, n_features).
/// * `y` - Target vector of shape (n_samples,).
/// * `center` - Center both `x` and `y` by subtracting their means.
/// * `force_finite` - Replace non-finite coefficients (constant columns) with 0.0.
pub fn r_regression(x: &Array2<f64>, y: &Array1<f64>, center: bool, force_finite: bool) -> Array1<f64> {
    let n_samples = x.nrows() as f64;
    let n_features = x.ncols();

    let mut y_centered = y.to_owned();
    let mut x_means = Array1::zeros(n_features);
    let x_norms;

    if center {
        let y_mean = y.mean().unwrap_or(0.0);
        y_centered -= y_mean;

        for (i, col) in x.columns().into_iter().enumerate() {
            x_means[i] = col.mean().unwrap_or(0.0);
        }

        // Scaled standard deviations via moments
        let x_squared_norms = row_norms(&x.t(), true);
        x_norms = (&x_squared_norms - n_samples * &x_means.mapv(|m: f64| m.powi(2)))
            .mapv(|v: f64| v.max(0.0).sqrt());
    } else {
        x_norms = row_norms(&x.t(), false);
    }

    let mut correlation_coefficient = Array1::zeros(n_features);
    for (i, col) in x.columns().into_iter().enumerate() {
        let centered_col = if center {
            col.mapv(|v| v - x_means[i])
        } else {
            col.to_owned()
        };
        correlation_coefficient[i] = centered_col.dot(&y_centered);
    }

    let y_norm = y_centered.dot(&y_centered).sqrt();

    correlation_coefficient /= &x_norms;
    correlation_coefficient /= y_norm;
    // rounding can push |r| just above 1 for collinear columns
    correlation_coefficient.mapv_inplace(|r| r.clamp(-1.0, 1.0));

    if force_finite {
        correlation_coefficient.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
    }

    correlation_coefficient
}

/// Univariate linear regression tests returning F-statistic and p-values.
///
/// Returns `(f_statistic, p_values)`, one entry per feature column. Fails when
/// there are too few samples for a positive number of degrees of freedom.
pub fn f_regression(
    x: &Array2<f64>,
    y: &Array1<f64>,
    center: bool,
    force_finite: bool,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let correlation_coefficient = r_regression(x, y, center, force_finite);
    let deg_of_freedom = y.len() as f64 - if center { 2.0 } else { 1.0 };
    if deg_of_freedom <= 0.0 {
        return Err(PipelineError::EmptyInput(format!(
            "f_regression needs more than {} samples, got {}",
            if center { 2 } else { 1 },
            y.len()
        ))
        .into());
    }

    let corr_coef_squared = correlation_coefficient.mapv(|r| r.powi(2));
    let mut f_statistic = &corr_coef_squared / (1.0 - &corr_coef_squared) * deg_of_freedom;

    let f_dist = FisherSnedecor::new(1.0, deg_of_freedom)
        .context("Failed to build F distribution")?;
    let mut p_values = f_statistic.mapv(|f| 1.0 - f_dist.cdf(f));

    if force_finite {
        for (f, p) in f_statistic.iter_mut().zip(p_values.iter_mut()) {
            if f.is_infinite() {
                *f = f64::MAX;
                *p = 0.0;
            } else if f.is_nan() {
                *f = 0.0;
                *p = 1.0;
            }
        }
    }

    Ok((f_statistic, p_values))
}

/// Keeps the `k` columns with the highest F-scores.
///
/// Fitted on the training matrix; the selected columns are then taken from
/// both training and test matrices, in their original order.
#[derive(Debug, Clone)]
pub struct SelectKBest {
    k: usize,
    selected: Option<Vec<usize>>,
}

impl SelectKBest {
    pub fn new(k: usize) -> Self {
        SelectKBest { k, selected: None }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Selected column indices in ascending order, once fitted.
    pub fn selected(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }

    /// Score every column against `y` and remember the `k` best.
    pub fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<&[usize]> {
        let x = x.mapv(f64::from);
        let y: Array1<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let (f_scores, _) = f_regression(&x, &y, true, true)?;

        let mut indices: Vec<usize> = (0..f_scores.len()).collect();
        // Stable sort, so ties keep the lower column index first.
        indices.sort_by(|&i, &j| {
            f_scores[j]
                .partial_cmp(&f_scores[i])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        indices.truncate(self.k);
        indices.sort_unstable();

        log::debug!(
            "SelectKBest kept {} of {} columns: {:?}",
            indices.len(),
            f_scores.len(),
            indices
        );
        Ok(self.selected.insert(indices).as_slice())
    }

    /// Columns of `x` chosen by [`SelectKBest::fit`].
    pub fn transform(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let selected = self
            .selected
            .as_ref()
            .ok_or_else(|| PipelineError::ModelNotFitted("select_k_best".to_string()))?;
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
