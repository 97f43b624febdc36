//! Per-sample aggregation and the batch walk over a data directory.
//!
//! The data directory holds one sub-directory per patient, named by its integer
//! patient id, and one sub-directory per image below that:
//!
//! ```text
//! <data_dir>/<patient_id>/<sample>/<sample>_mean.csv
//!                                 /<sample>_std.csv
//!                                 /<sample>_mask.npy
//!                                 /<sample>_feature_<name>.npy
//! ```
//!
//! Patients and samples are visited in lexicographic directory order and the
//! resulting datasets keep that order, so two runs over the same inputs yield
//! identical datasets.
pub mod imaging;
pub mod tabular;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::catalog::FeatureCatalog;
use crate::config::NamingConvention;
use crate::data_handling::{ImagingDataset, TabularDataset, TabularSample, TensorSample};
use crate::error::PipelineError;
use crate::io::artifacts::sorted_entries;
use crate::registry::{PatientId, PatientRegistry};

pub use imaging::{aggregate_tensor, crop_top_left};
pub use tabular::aggregate_statistics;

/// One sample directory and the patient it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleLocation {
    pub patient_id: PatientId,
    pub name: String,
    pub dir: PathBuf,
}

/// Patient id encoded by the parent directory of `sample_dir`.
pub fn patient_id_of(sample_dir: &Path) -> Result<PatientId> {
    let patient_dir = sample_dir
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Sample directory has no patient directory: {}", sample_dir.display()))?;
    parse_patient_dir(&patient_dir)
}

fn parse_patient_dir(name: &str) -> Result<PatientId> {
    name.parse::<PatientId>()
        .map_err(|_| PipelineError::InvalidPatientDirectory(name.to_string()).into())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Every sample directory below `data_dir`, in patient then sample order.
///
/// Plain files at either level are ignored; a patient directory whose name is
/// not an integer is an error.
pub fn sample_locations(data_dir: &Path) -> Result<Vec<SampleLocation>> {
    let mut locations = Vec::new();
    for patient_dir in sorted_entries(data_dir)? {
        if !patient_dir.is_dir() {
            continue;
        }
        let patient_id = parse_patient_dir(&file_name_of(&patient_dir))?;
        for sample_dir in sorted_entries(&patient_dir)? {
            if !sample_dir.is_dir() {
                continue;
            }
            locations.push(SampleLocation {
                patient_id,
                name: file_name_of(&sample_dir),
                dir: sample_dir,
            });
        }
    }

    if locations.is_empty() {
        return Err(PipelineError::EmptyInput(format!(
            "no sample directories found under {}",
            data_dir.display()
        ))
        .into());
    }
    Ok(locations)
}

/// The first sample directory under `data_dir`, used to discover the catalog.
pub fn reference_sample_dir(data_dir: &Path) -> Result<PathBuf> {
    let first = sample_locations(data_dir)?.swap_remove(0);
    log::debug!("Reference sample directory: {}", first.dir.display());
    Ok(first.dir)
}

/// Aggregate mean/std statistics of every sample under `data_dir`.
///
/// Samples whose statistics tables are empty after dropping incomplete rows
/// are left out and counted in the log.
pub fn aggregate_tabular(
    data_dir: &Path,
    registry: &PatientRegistry,
    catalog: &FeatureCatalog,
    naming: &NamingConvention,
) -> Result<TabularDataset> {
    let locations = sample_locations(data_dir)?;
    log::info!(
        "Aggregating statistics of {} samples from {}",
        locations.len(),
        data_dir.display()
    );

    let aggregated = locations
        .par_iter()
        .map(|location| -> Result<Option<TabularSample>> {
            let label = registry.label(location.patient_id)?;
            let Some((values, patient_id)) = aggregate_statistics(&location.dir, catalog, naming)
                .with_context(|| format!("Failed to aggregate {}", location.dir.display()))?
            else {
                return Ok(None);
            };
            Ok(Some(TabularSample {
                patient_id,
                label,
                values,
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    let total = aggregated.len();
    let samples: Vec<TabularSample> = aggregated.into_iter().flatten().collect();
    if samples.len() < total {
        log::warn!(
            "Skipped {} of {} samples with no complete statistics row",
            total - samples.len(),
            total
        );
    }

    let dataset = TabularDataset {
        catalog: catalog.clone(),
        samples,
    };
    log::info!(
        "Aggregated {} samples of {} patients into {} columns",
        dataset.len(),
        dataset.patient_ids().len(),
        dataset.n_columns()
    );
    Ok(dataset)
}

/// Aggregate a cropped, masked tensor for every sample under `data_dir`.
pub fn aggregate_imaging(
    data_dir: &Path,
    registry: &PatientRegistry,
    catalog: &FeatureCatalog,
    crop_shape: (usize, usize),
    naming: &NamingConvention,
) -> Result<ImagingDataset> {
    let locations = sample_locations(data_dir)?;
    log::info!(
        "Aggregating {}x{} tensors with {} channels for {} samples from {}",
        crop_shape.0,
        crop_shape.1,
        catalog.len(),
        locations.len(),
        data_dir.display()
    );

    let samples = locations
        .par_iter()
        .map(|location| -> Result<TensorSample> {
            let label = registry.label(location.patient_id)?;
            let (tensor, patient_id) = aggregate_tensor(&location.dir, catalog, crop_shape, naming)
                .with_context(|| format!("Failed to aggregate {}", location.dir.display()))?;
            Ok(TensorSample {
                patient_id,
                label,
                sample: location.name.clone(),
                tensor,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let dataset = ImagingDataset {
        catalog: catalog.clone(),
        crop_shape,
        samples,
    };
    log::info!(
        "Aggregated {} tensors of {} patients",
        dataset.len(),
        dataset.patient_ids().len()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_id_comes_from_parent_directory() {
        assert_eq!(patient_id_of(Path::new("/data/0042/L_CC")).unwrap(), 42);
        let err = patient_id_of(Path::new("/data/abc/L_CC")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::InvalidPatientDirectory(name)) if name == "abc"
        ));
    }

    #[test]
    fn locations_are_sorted_and_skip_plain_files() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["2/R_CC", "2/L_CC", "10/L_MLO"] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }
        std::fs::write(root.path().join("README.txt"), b"").unwrap();
        std::fs::write(root.path().join("2").join("notes.txt"), b"").unwrap();

        let locations = sample_locations(root.path()).unwrap();
        let found: Vec<(PatientId, &str)> = locations
            .iter()
            .map(|l| (l.patient_id, l.name.as_str()))
            .collect();
        // directory names sort lexicographically, so "10" precedes "2"
        assert_eq!(found, vec![(10, "L_MLO"), (2, "L_CC"), (2, "R_CC")]);
    }

    #[test]
    fn empty_data_directory_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(sample_locations(root.path()).is_err());
    }
}
