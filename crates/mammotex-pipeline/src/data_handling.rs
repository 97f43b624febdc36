//! Aggregated sample containers.
//!
//! This module defines the tabular and imaging datasets produced by the
//! aggregator, together with helpers for applying a patient partition and
//! assembling the dense matrices and arrays consumed by models and exports.
use std::collections::BTreeSet;

use anyhow::{bail, Result};
use ndarray::{Array2, Array3, Array4, Axis};

use crate::catalog::FeatureCatalog;
use crate::error::PipelineError;
use crate::registry::PatientId;
use crate::splitter::{Partition, Side};

/// Anything that belongs to exactly one patient.
pub trait PatientSample {
    fn patient_id(&self) -> PatientId;
    fn label(&self) -> bool;
}

/// One tabular sample: means then stds in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularSample {
    pub patient_id: PatientId,
    pub label: bool,
    pub values: Vec<f64>,
}

impl PatientSample for TabularSample {
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    fn label(&self) -> bool {
        self.label
    }
}

/// One image: `height x width x channel`, channels in catalog order.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSample {
    pub patient_id: PatientId,
    pub label: bool,
    /// Name of the sample directory the tensor came from (e.g. `L_CC`).
    pub sample: String,
    pub tensor: Array3<f32>,
}

impl PatientSample for TensorSample {
    fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    fn label(&self) -> bool {
        self.label
    }
}

/// Split samples by their patient's side of `partition`, keeping sample order.
pub fn split_samples<T>(samples: &[T], partition: &Partition) -> Result<(Vec<T>, Vec<T>)>
where
    T: PatientSample + Clone,
{
    let mut train = Vec::new();
    let mut test = Vec::new();
    for sample in samples {
        match partition.side_of(sample.patient_id()) {
            Some(Side::Train) => train.push(sample.clone()),
            Some(Side::Test) => test.push(sample.clone()),
            None => return Err(PipelineError::UnassignedPatient(sample.patient_id()).into()),
        }
    }
    Ok((train, test))
}

fn binary_targets<T: PatientSample>(samples: &[T]) -> Vec<i32> {
    samples.iter().map(|s| i32::from(s.label())).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    pub catalog: FeatureCatalog,
    pub samples: Vec<TabularSample>,
}

impl TabularDataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        2 * self.catalog.len()
    }

    pub fn patient_ids(&self) -> BTreeSet<PatientId> {
        self.samples.iter().map(|s| s.patient_id).collect()
    }

    /// `(train, test)` datasets according to `partition`.
    pub fn partition(&self, partition: &Partition) -> Result<(TabularDataset, TabularDataset)> {
        let (train, test) = split_samples(&self.samples, partition)?;
        Ok((
            TabularDataset {
                catalog: self.catalog.clone(),
                samples: train,
            },
            TabularDataset {
                catalog: self.catalog.clone(),
                samples: test,
            },
        ))
    }

    /// Feature matrix (`f32`, one row per sample) and 0/1 targets.
    pub fn to_matrix(&self) -> Result<(Array2<f32>, Vec<i32>)> {
        let ncols = self.n_columns();
        let mut data = Vec::with_capacity(self.samples.len() * ncols);
        for sample in &self.samples {
            if sample.values.len() != ncols {
                bail!(
                    "sample of patient {} has {} values, expected {}",
                    sample.patient_id,
                    sample.values.len(),
                    ncols
                );
            }
            data.extend(sample.values.iter().map(|&v| v as f32));
        }
        let x = Array2::from_shape_vec((self.samples.len(), ncols), data)?;
        Ok((x, binary_targets(&self.samples)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagingDataset {
    pub catalog: FeatureCatalog,
    pub crop_shape: (usize, usize),
    pub samples: Vec<TensorSample>,
}

impl ImagingDataset {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn patient_ids(&self) -> BTreeSet<PatientId> {
        self.samples.iter().map(|s| s.patient_id).collect()
    }

    pub fn partition(&self, partition: &Partition) -> Result<(ImagingDataset, ImagingDataset)> {
        let (train, test) = split_samples(&self.samples, partition)?;
        Ok((
            ImagingDataset {
                catalog: self.catalog.clone(),
                crop_shape: self.crop_shape,
                samples: train,
            },
            ImagingDataset {
                catalog: self.catalog.clone(),
                crop_shape: self.crop_shape,
                samples: test,
            },
        ))
    }

    /// Stack every tensor into one `N x height x width x channel` array.
    pub fn to_array4(&self) -> Result<Array4<f32>> {
        let (height, width) = self.crop_shape;
        let channels = self.catalog.len();
        let mut stacked = Array4::<f32>::zeros((self.samples.len(), height, width, channels));
        for (mut slot, sample) in stacked.axis_iter_mut(Axis(0)).zip(&self.samples) {
            if sample.tensor.dim() != (height, width, channels) {
                bail!(
                    "tensor of patient {} ({}) has shape {:?}, expected {:?}",
                    sample.patient_id,
                    sample.sample,
                    sample.tensor.dim(),
                    (height, width, channels)
                );
            }
            slot.assign(&sample.tensor);
        }
        Ok(stacked)
    }

    pub fn labels(&self) -> Vec<u8> {
        self.samples.iter().map(|s| u8::from(s.label)).collect()
    }

    pub fn patient_column(&self) -> Vec<PatientId> {
        self.samples.iter().map(|s| s.patient_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor_sample(patient_id: PatientId, label: bool, sample: &str, fill: f32) -> TensorSample {
        TensorSample {
            patient_id,
            label,
            sample: sample.to_string(),
            tensor: Array3::from_elem((2, 2, 1), fill),
        }
    }

    #[test]
    fn both_images_of_a_patient_follow_the_patient() {
        let dataset = ImagingDataset {
            catalog: FeatureCatalog::from_names(["a"]),
            crop_shape: (2, 2),
            samples: vec![
                tensor_sample(1, true, "L_CC", 1.0),
                tensor_sample(2, false, "L_CC", 2.0),
                tensor_sample(1, true, "R_CC", 3.0),
            ],
        };
        let partition = Partition::from_assignment(vec![1], vec![2]).unwrap();
        let (train, test) = dataset.partition(&partition).unwrap();
        assert_eq!(train.len(), 2);
        assert!(train.samples.iter().all(|s| s.patient_id == 1 && s.label));
        assert_eq!(test.patient_ids().into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn sample_of_unassigned_patient_is_an_error() {
        let samples = vec![tensor_sample(5, false, "L_CC", 0.0)];
        let partition = Partition::from_assignment(vec![1], vec![2]).unwrap();
        let err = split_samples(&samples, &partition).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnassignedPatient(5))
        ));
    }

    #[test]
    fn tabular_matrix_keeps_row_order() {
        let dataset = TabularDataset {
            catalog: FeatureCatalog::from_names(["a"]),
            samples: vec![
                TabularSample {
                    patient_id: 1,
                    label: true,
                    values: vec![1.0, 0.5],
                },
                TabularSample {
                    patient_id: 2,
                    label: false,
                    values: vec![2.0, 0.25],
                },
            ],
        };
        let (x, y) = dataset.to_matrix().unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[1, 0]], 2.0);
        assert_eq!(y, vec![1, 0]);
    }
}
