use std::path::Path;

use anyhow::Result;
use ndarray::{s, Array2, Array3};

use crate::catalog::FeatureCatalog;
use crate::config::NamingConvention;
use crate::error::PipelineError;
use crate::io::artifacts::scan_sample_dir;
use crate::io::volume::read_map;
use crate::registry::PatientId;

use super::patient_id_of;

/// Masked, cropped `height x width x channel` tensor of one sample.
///
/// Every feature map is multiplied by the sample mask at full resolution and
/// then cropped to the top-left `crop_shape` region. Channel `i` holds the
/// feature at catalog position `i`.
pub fn aggregate_tensor(
    sample_dir: &Path,
    catalog: &FeatureCatalog,
    crop_shape: (usize, usize),
    naming: &NamingConvention,
) -> Result<(Array3<f32>, PatientId)> {
    let patient_id = patient_id_of(sample_dir)?;
    let artifacts = scan_sample_dir(sample_dir, naming)?;
    let mask = read_map(artifacts.mask_volume()?)?;

    let (height, width) = crop_shape;
    let mut tensor = Array3::<f32>::zeros((height, width, catalog.len()));
    for (channel, name) in catalog.iter() {
        let mut feature = read_map(artifacts.feature_volume(name)?)?;
        if feature.dim() != mask.dim() {
            return Err(PipelineError::ShapeMismatch {
                context: format!("feature '{}' against the mask in {}", name, sample_dir.display()),
                expected: mask.dim(),
                actual: feature.dim(),
            }
            .into());
        }
        feature *= &mask;
        let cropped = crop_top_left(&feature, crop_shape, name)?;
        tensor.slice_mut(s![.., .., channel]).assign(&cropped);
    }
    Ok((tensor, patient_id))
}

/// Top-left `crop_shape` window of `map`.
pub fn crop_top_left(map: &Array2<f32>, crop_shape: (usize, usize), feature: &str) -> Result<Array2<f32>> {
    let (height, width) = crop_shape;
    if map.nrows() < height || map.ncols() < width {
        return Err(PipelineError::ShapeMismatch {
            context: format!("feature '{}' cropped", feature),
            expected: crop_shape,
            actual: map.dim(),
        }
        .into());
    }
    Ok(map.slice(s![..height, ..width]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use ndarray_npy::write_npy;
    use std::path::PathBuf;

    fn ramp(rows: usize, cols: usize, offset: f32) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| offset + (r * cols + c) as f32)
    }

    fn write_sample(root: &Path, shape: (usize, usize)) -> PathBuf {
        let dir = root.join("3").join("R_MLO");
        std::fs::create_dir_all(&dir).unwrap();
        let mut mask = Array2::<f32>::ones(shape);
        mask[[0, 1]] = 0.0;
        write_npy(dir.join("R_MLO_mask.npy"), &mask).unwrap();
        write_npy(dir.join("R_MLO_feature_b.npy"), &ramp(shape.0, shape.1, 100.0)).unwrap();
        write_npy(dir.join("R_MLO_feature_a.npy"), &ramp(shape.0, shape.1, 0.0)).unwrap();
        dir
    }

    #[test]
    fn channels_follow_catalog_and_mask_is_applied() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_sample(root.path(), (4, 5));
        let catalog = FeatureCatalog::from_names(["a", "b"]);

        let (tensor, patient_id) =
            aggregate_tensor(&dir, &catalog, (2, 3), &NamingConvention::default()).unwrap();
        assert_eq!(patient_id, 3);
        assert_eq!(tensor.dim(), (2, 3, 2));
        assert_eq!(tensor[[0, 0, 0]], 0.0);
        assert_eq!(tensor[[0, 1, 0]], 0.0);
        assert_eq!(tensor[[1, 2, 0]], 7.0);
        assert_eq!(tensor[[0, 1, 1]], 0.0);
        assert_eq!(tensor[[1, 2, 1]], 107.0);
    }

    #[test]
    fn map_smaller_than_crop_is_a_shape_mismatch() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_sample(root.path(), (2, 2));
        let catalog = FeatureCatalog::from_names(["a", "b"]);

        let err = aggregate_tensor(&dir, &catalog, (4, 4), &NamingConvention::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn feature_and_mask_shapes_must_agree() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_sample(root.path(), (4, 5));
        write_npy(dir.join("R_MLO_feature_b.npy"), &ramp(5, 4, 0.0)).unwrap();
        let catalog = FeatureCatalog::from_names(["a", "b"]);

        let err = aggregate_tensor(&dir, &catalog, (2, 2), &NamingConvention::default()).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::ShapeMismatch { expected, actual, .. }) => {
                assert_eq!(*expected, (4, 5));
                assert_eq!(*actual, (5, 4));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_catalog_feature_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let dir = write_sample(root.path(), (2, 2));
        let catalog = FeatureCatalog::from_names(["a", "c"]);

        let err = aggregate_tensor(&dir, &catalog, (2, 2), &NamingConvention::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingArtifact { .. })
        ));
    }
}
