//! Two-pass normalization of `height x width x channel` tensors.
//!
//! 1. Cross-sample: every channel is divided by its largest magnitude over the
//!    train and test tensors together, plus `epsilon`.
//! 2. Within-sample: every channel of every tensor is divided by its own
//!    largest magnitude, plus `epsilon`.
//!
//! The cross-sample statistics see the test tensors. This leaks test set
//! scale into training inputs and is kept for comparability with earlier runs.
//!
//! The second pass only starts once the first has finished for all tensors.
use anyhow::Result;
use ndarray::{Array3, Axis};
use rayon::prelude::*;

use crate::data_handling::ImagingDataset;
use crate::error::PipelineError;

/// Per-channel maximum magnitude over a set of tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelScale {
    pub max_abs: Vec<f32>,
}

impl ChannelScale {
    /// Largest magnitude of each channel over every tensor of `tensors`.
    pub fn fit<'a, I>(tensors: I, channels: usize) -> Self
    where
        I: IntoParallelIterator<Item = &'a Array3<f32>>,
    {
        let max_abs = tensors
            .into_par_iter()
            .map(channel_max_abs)
            .reduce(
                || vec![0.0f32; channels],
                |a, b| a.iter().zip(&b).map(|(x, y)| x.max(*y)).collect(),
            );
        Self { max_abs }
    }

    pub fn divisors(&self, epsilon: f32) -> Vec<f32> {
        self.max_abs.iter().map(|m| m + epsilon).collect()
    }
}

fn channel_max_abs(tensor: &Array3<f32>) -> Vec<f32> {
    tensor
        .axis_iter(Axis(2))
        .map(|channel| channel.fold(0.0f32, |m, &v| m.max(v.abs())))
        .collect()
}

fn scale_channels(tensor: &mut Array3<f32>, divisors: &[f32]) {
    for (mut channel, &divisor) in tensor.axis_iter_mut(Axis(2)).zip(divisors) {
        channel.mapv_inplace(|v| v / divisor);
    }
}

fn check_channels(tensors: &[Array3<f32>], expected: usize) -> Result<()> {
    if let Some(found) = tensors.iter().map(|t| t.dim().2).find(|&c| c != expected) {
        return Err(PipelineError::ChannelMismatch { expected, found }.into());
    }
    Ok(())
}

/// First pass only: divide every channel by its train+test maximum magnitude.
pub fn cross_sample_normalize(
    train: &[Array3<f32>],
    test: &[Array3<f32>],
    epsilon: f32,
) -> Result<(Vec<Array3<f32>>, Vec<Array3<f32>>)> {
    let Some(first) = train.first().or_else(|| test.first()) else {
        return Ok((Vec::new(), Vec::new()));
    };
    let channels = first.dim().2;
    check_channels(train, channels)?;
    check_channels(test, channels)?;

    let scale = ChannelScale::fit(train.par_iter().chain(test.par_iter()), channels);
    log::debug!("Cross-sample channel maxima: {:?}", scale.max_abs);
    let divisors = scale.divisors(epsilon);

    let apply = |tensors: &[Array3<f32>]| -> Vec<Array3<f32>> {
        tensors
            .par_iter()
            .map(|tensor| {
                let mut scaled = tensor.clone();
                scale_channels(&mut scaled, &divisors);
                scaled
            })
            .collect()
    };
    Ok((apply(train), apply(test)))
}

/// Second pass only: divide every channel of every tensor by its own maximum magnitude.
pub fn within_sample_normalize(tensors: &mut [Array3<f32>], epsilon: f32) {
    tensors.par_iter_mut().for_each(|tensor| {
        let divisors: Vec<f32> = channel_max_abs(tensor).iter().map(|m| m + epsilon).collect();
        scale_channels(tensor, &divisors);
    });
}

/// Both passes. Output shapes equal input shapes.
pub fn normalize(
    train: &[Array3<f32>],
    test: &[Array3<f32>],
    epsilon: f32,
) -> Result<(Vec<Array3<f32>>, Vec<Array3<f32>>)> {
    let (mut train, mut test) = cross_sample_normalize(train, test, epsilon)?;
    within_sample_normalize(&mut train, epsilon);
    within_sample_normalize(&mut test, epsilon);
    log::info!(
        "Normalized {} train and {} test tensors",
        train.len(),
        test.len()
    );
    Ok((train, test))
}

/// Normalize the tensors of a partitioned imaging dataset in place.
pub fn normalize_datasets(
    train: &mut ImagingDataset,
    test: &mut ImagingDataset,
    epsilon: f32,
) -> Result<()> {
    let take = |dataset: &mut ImagingDataset| -> Vec<Array3<f32>> {
        dataset
            .samples
            .iter_mut()
            .map(|s| std::mem::take(&mut s.tensor))
            .collect()
    };
    let train_tensors = take(train);
    let test_tensors = take(test);

    let (train_tensors, test_tensors) = normalize(&train_tensors, &test_tensors, epsilon)?;
    for (sample, tensor) in train.samples.iter_mut().zip(train_tensors) {
        sample.tensor = tensor;
    }
    for (sample, tensor) in test.samples.iter_mut().zip(test_tensors) {
        sample.tensor = tensor;
    }
    Ok(())
}
