//! Classification metrics for the evaluation harness.
use anyhow::{bail, Result};

use crate::error::PipelineError;

/// Fraction of positions where `predicted` equals `actual`.
pub fn accuracy(actual: &[i32], predicted: &[i32]) -> Result<f64> {
    if actual.is_empty() {
        return Err(PipelineError::EmptyInput("accuracy of zero samples".to_string()).into());
    }
    if actual.len() != predicted.len() {
        bail!(
            "actual length {} != predicted length {}",
            actual.len(),
            predicted.len()
        );
    }
    let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
    Ok(correct as f64 / actual.len() as f64)
}

/// A single point on the ROC curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RocPoint {
    /// Scores at or above this value are predicted positive.
    pub threshold: f64,
    /// False positive rate: FP / (FP + TN).
    pub fpr: f64,
    /// True positive rate: TP / (TP + FN).
    pub tpr: f64,
}

/// ROC curve with AUC.
#[derive(Debug, Clone)]
pub struct RocCurve {
    /// Points on the curve, from (0, 0) to (1, 1).
    pub points: Vec<RocPoint>,
    /// Area under the ROC curve (trapezoidal rule).
    pub auc: f64,
}

/// Compute the ROC curve from predicted scores and binary labels.
///
/// Sorts by descending score and emits one point per distinct score, so tied
/// scores contribute a diagonal segment (half credit). Includes the endpoints
/// (0,0) and (1,1).
///
/// Fails if the slices are empty or differ in length, if a score is NaN or
/// infinite, or if the labels hold only one class.
pub fn roc_curve(scores: &[f64], labels: &[bool]) -> Result<RocCurve> {
    if scores.is_empty() {
        return Err(PipelineError::EmptyInput("ROC curve of zero samples".to_string()).into());
    }
    if let Some(idx) = scores.iter().position(|s| !s.is_finite()) {
        return Err(PipelineError::NonFiniteValue(format!("ROC score at position {}", idx)).into());
    }
    if scores.len() != labels.len() {
        bail!(
            "scores length {} != labels length {}",
            scores.len(),
            labels.len()
        );
    }

    let total_pos = labels.iter().filter(|&&l| l).count();
    let total_neg = labels.len() - total_pos;
    if total_pos == 0 || total_neg == 0 {
        bail!(
            "ROC curve needs both classes, got {} cases and {} controls",
            total_pos,
            total_neg
        );
    }

    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let p = total_pos as f64;
    let n = total_neg as f64;

    let mut points = vec![RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    }];

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < indices.len() {
        let current_score = scores[indices[i]];
        while i < indices.len() && scores[indices[i]] == current_score {
            if labels[indices[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold: current_score,
            fpr: fp as f64 / n,
            tpr: tp as f64 / p,
        });
    }

    let auc = trapezoidal_auc(&points);
    Ok(RocCurve { points, auc })
}

/// Shorthand for `roc_curve(scores, labels)?.auc`.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Result<f64> {
    Ok(roc_curve(scores, labels)?.auc)
}

fn trapezoidal_auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr).abs() * (w[1].tpr + w[0].tpr) / 2.0)
        .sum()
}
