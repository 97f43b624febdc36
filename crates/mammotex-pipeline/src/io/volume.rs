//! `.npy` mask and feature volumes.
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use ndarray_npy::read_npy;

use crate::error::PipelineError;

/// Read a volume as a 2-D `f32` map with non-finite values replaced by zero.
///
/// Volumes may be stored as `f32`, `f64`, `u8` or `bool` and may carry
/// singleton axes (e.g. `1 x H x W`), which are dropped.
pub fn read_map(path: &Path) -> Result<Array2<f32>> {
    let volume = read_any_dtype(path)?;
    let mut map = squeeze_to_map(volume, path)?;
    map.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
    Ok(map)
}

fn read_any_dtype(path: &Path) -> Result<ArrayD<f32>> {
    let first_err = match read_npy::<_, ArrayD<f32>>(path) {
        Ok(volume) => return Ok(volume),
        Err(e) => e,
    };
    if let Ok(volume) = read_npy::<_, ArrayD<f64>>(path) {
        return Ok(volume.mapv(|v| v as f32));
    }
    if let Ok(volume) = read_npy::<_, ArrayD<u8>>(path) {
        return Ok(volume.mapv(f32::from));
    }
    if let Ok(volume) = read_npy::<_, ArrayD<bool>>(path) {
        return Ok(volume.mapv(|v| if v { 1.0 } else { 0.0 }));
    }
    Err(first_err).with_context(|| format!("Failed to read volume: {}", path.display()))
}

fn squeeze_to_map(mut volume: ArrayD<f32>, path: &Path) -> Result<Array2<f32>> {
    let invalid = |shape: &[usize]| PipelineError::InvalidVolume {
        path: path.to_path_buf(),
        shape: shape.to_vec(),
    };

    while volume.ndim() > 2 {
        match volume.shape().iter().position(|&d| d == 1) {
            Some(axis) => volume = volume.index_axis_move(Axis(axis), 0),
            None => return Err(invalid(volume.shape()).into()),
        }
    }
    if volume.ndim() != 2 {
        return Err(invalid(volume.shape()).into());
    }
    Ok(volume.into_dimensionality::<Ix2>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array3};
    use ndarray_npy::write_npy;

    #[test]
    fn singleton_axes_are_squeezed_and_non_finite_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_feature_a.npy");
        let mut volume = Array3::<f64>::zeros((1, 2, 3));
        volume[[0, 1, 2]] = f64::NAN;
        volume[[0, 0, 1]] = 2.5;
        write_npy(&path, &volume).unwrap();

        let map = read_map(&path).unwrap();
        assert_eq!(map.dim(), (2, 3));
        assert_eq!(map[[0, 1]], 2.5);
        assert_eq!(map[[1, 2]], 0.0);
    }

    #[test]
    fn genuine_3d_volume_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_mask.npy");
        write_npy(&path, &Array3::<f32>::zeros((2, 2, 2))).unwrap();
        let err = read_map(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidVolume { .. })
        ));
    }

    #[test]
    fn byte_masks_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_mask.npy");
        write_npy(&path, &arr2(&[[0u8, 1], [1, 0]])).unwrap();
        assert_eq!(read_map(&path).unwrap(), arr2(&[[0.0f32, 1.0], [1.0, 0.0]]));
    }
}
