use std::path::Path;

use anyhow::Result;

use crate::catalog::FeatureCatalog;
use crate::config::NamingConvention;
use crate::io::artifacts::scan_sample_dir;
use crate::io::stats_table::read_stats_table;
use crate::registry::PatientId;

use super::patient_id_of;

/// Mean and std statistics of one sample, in catalog order.
///
/// Returns `Ok(None)` when the mean or the std table has no complete row: such
/// samples are left out rather than imputed.
pub fn aggregate_statistics(
    sample_dir: &Path,
    catalog: &FeatureCatalog,
    naming: &NamingConvention,
) -> Result<Option<(Vec<f64>, PatientId)>> {
    let patient_id = patient_id_of(sample_dir)?;
    let artifacts = scan_sample_dir(sample_dir, naming)?;

    let mean = read_stats_table(artifacts.mean_table()?, catalog.names())?;
    let std = read_stats_table(artifacts.std_table()?, catalog.names())?;
    if mean.is_empty() || std.is_empty() {
        log::debug!(
            "Skipping {}: no complete statistics row (mean dropped {}, std dropped {})",
            sample_dir.display(),
            mean.dropped_rows,
            std.dropped_rows
        );
        return Ok(None);
    }

    let mut values = mean.first_row()?.to_vec();
    values.extend_from_slice(std.first_row()?);
    Ok(Some((values, patient_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_dir(root: &Path, mean: &str, std: &str) -> PathBuf {
        let dir = root.join("12").join("L_CC");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("L_CC_mean.csv"), mean).unwrap();
        std::fs::write(dir.join("L_CC_std.csv"), std).unwrap();
        dir
    }

    #[test]
    fn means_then_stds_in_catalog_order() {
        let root = tempfile::tempdir().unwrap();
        let dir = sample_dir(root.path(), "c,b,a\n3,2,1\n", "b,a,c\n0.2,0.1,0.3\n");
        let catalog = FeatureCatalog::from_names(["a", "b", "c"]);

        let (values, patient_id) = aggregate_statistics(&dir, &catalog, &NamingConvention::default())
            .unwrap()
            .unwrap();
        assert_eq!(patient_id, 12);
        assert_eq!(values, vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn empty_after_dropping_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let dir = sample_dir(root.path(), "a\n1\n", "a\nnan\n");
        let catalog = FeatureCatalog::from_names(["a"]);
        let result = aggregate_statistics(&dir, &catalog, &NamingConvention::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn image_id_column_does_not_block_aggregation() {
        let root = tempfile::tempdir().unwrap();
        let dir = sample_dir(
            root.path(),
            "image,a,b\nL_CC.dcm,1,2\n",
            "image,a,b\nL_CC.dcm,0.1,0.2\n",
        );
        let catalog = FeatureCatalog::from_names(["a", "b"]);
        let (values, _) = aggregate_statistics(&dir, &catalog, &NamingConvention::default())
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![1.0, 2.0, 0.1, 0.2]);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let root = tempfile::tempdir().unwrap();
        let dir = sample_dir(
            root.path(),
            "a,b\n0.30000000000000004,1e-7\n",
            "a,b\n2.5,7\n",
        );
        let catalog = FeatureCatalog::from_names(["a", "b"]);
        let naming = NamingConvention::default();
        let first = aggregate_statistics(&dir, &catalog, &naming).unwrap().unwrap();
        let second = aggregate_statistics(&dir, &catalog, &naming).unwrap().unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first.0), bits(&second.0));
    }
}
