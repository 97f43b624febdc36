//! `.npy` export of imaging datasets for downstream convolutional models.
//!
//! For each side (`train`, `test`) three arrays are written:
//! `<side>_tensors.npy` (`N x H x W x C`, `f32`), `<side>_labels.npy` (`N`, `u8`)
//! and `<side>_patients.npy` (`N`, `i64`). `channels.json` lists the channel
//! names in order.
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array1;
use ndarray_npy::write_npy;

use crate::data_handling::ImagingDataset;

pub const CHANNELS_FILE: &str = "channels.json";

fn side_path(dir: &Path, side: &str, what: &str) -> PathBuf {
    dir.join(format!("{}_{}.npy", side, what))
}

/// Write one side of a partitioned imaging dataset below `dir`.
pub fn write_tensor_side(dir: &Path, side: &str, dataset: &ImagingDataset) -> Result<()> {
    let tensors = dataset.to_array4()?;
    let labels = Array1::from(dataset.labels());
    let patients = Array1::from(dataset.patient_column());

    let tensors_path = side_path(dir, side, "tensors");
    write_npy(&tensors_path, &tensors)
        .with_context(|| format!("Failed to write {}", tensors_path.display()))?;
    let labels_path = side_path(dir, side, "labels");
    write_npy(&labels_path, &labels)
        .with_context(|| format!("Failed to write {}", labels_path.display()))?;
    let patients_path = side_path(dir, side, "patients");
    write_npy(&patients_path, &patients)
        .with_context(|| format!("Failed to write {}", patients_path.display()))?;

    log::info!(
        "Wrote {} {} tensors of shape {:?} to {}",
        dataset.len(),
        side,
        &tensors.shape()[1..],
        tensors_path.display()
    );
    Ok(())
}

/// Write both sides and the channel list, creating `dir` when needed.
pub fn export_tensors(dir: &Path, train: &ImagingDataset, test: &ImagingDataset) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create tensor directory: {}", dir.display()))?;
    write_tensor_side(dir, "train", train)?;
    write_tensor_side(dir, "test", test)?;

    let channels_path = dir.join(CHANNELS_FILE);
    let file = File::create(&channels_path)
        .with_context(|| format!("Failed to create {}", channels_path.display()))?;
    serde_json::to_writer_pretty(file, train.catalog.names())
        .with_context(|| format!("Failed to write {}", channels_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FeatureCatalog;
    use crate::data_handling::TensorSample;
    use ndarray::{Array3, Array4};
    use ndarray_npy::read_npy;

    #[test]
    fn sides_are_written_as_stacked_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = |ids: &[i64]| ImagingDataset {
            catalog: FeatureCatalog::from_names(["a", "b"]),
            crop_shape: (2, 3),
            samples: ids
                .iter()
                .map(|&id| TensorSample {
                    patient_id: id,
                    label: id % 2 == 1,
                    sample: "L_CC".to_string(),
                    tensor: Array3::from_elem((2, 3, 2), id as f32),
                })
                .collect(),
        };
        export_tensors(dir.path(), &dataset(&[1, 2, 3]), &dataset(&[8])).unwrap();

        let train: Array4<f32> = read_npy(dir.path().join("train_tensors.npy")).unwrap();
        assert_eq!(train.shape(), &[3, 2, 3, 2]);
        assert_eq!(train[[2, 1, 2, 1]], 3.0);
        let labels: Array1<u8> = read_npy(dir.path().join("train_labels.npy")).unwrap();
        assert_eq!(labels.to_vec(), vec![1, 0, 1]);
        let patients: Array1<i64> = read_npy(dir.path().join("test_patients.npy")).unwrap();
        assert_eq!(patients.to_vec(), vec![8]);

        let channels: Vec<String> =
            serde_json::from_reader(File::open(dir.path().join(CHANNELS_FILE)).unwrap()).unwrap();
        assert_eq!(channels, vec!["a", "b"]);
    }
}
