//! Aggregated feature table: `patient_id, mean_<f>..., std_<f>...`, one row per sample.
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::catalog::{FeatureCatalog, MEAN_PREFIX, STD_PREFIX};
use crate::data_handling::{TabularDataset, TabularSample};
use crate::registry::{PatientId, PatientRegistry};

pub const PATIENT_ID_COLUMN: &str = "patient_id";

pub fn write_feature_table(path: &Path, dataset: &TabularDataset) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create feature table: {}", path.display()))?;

    let mut header = vec![PATIENT_ID_COLUMN.to_string()];
    header.extend(dataset.catalog.column_names());
    writer.write_record(&header)?;

    for sample in &dataset.samples {
        let mut row = Vec::with_capacity(header.len());
        row.push(sample.patient_id.to_string());
        row.extend(sample.values.iter().map(f64::to_string));
        writer.write_record(&row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write feature table: {}", path.display()))?;

    log::info!(
        "Wrote {} samples x {} columns to {}",
        dataset.samples.len(),
        header.len() - 1,
        path.display()
    );
    Ok(())
}

/// Read a feature table back, joining labels from `registry`.
///
/// The catalog is recovered from the `mean_` columns and the `std_` columns must
/// repeat it in the same order.
pub fn read_feature_table(path: &Path, registry: &PatientRegistry) -> Result<TabularDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open feature table: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();

    if headers.get(0) != Some(PATIENT_ID_COLUMN) {
        bail!(
            "first column of {} must be '{}'",
            path.display(),
            PATIENT_ID_COLUMN
        );
    }
    let value_columns: Vec<&str> = headers.iter().skip(1).collect();
    if value_columns.len() % 2 != 0 {
        bail!("{} has an odd number of statistic columns", path.display());
    }

    let (mean_columns, std_columns) = value_columns.split_at(value_columns.len() / 2);
    let names = mean_columns
        .iter()
        .map(|c| {
            c.strip_prefix(MEAN_PREFIX)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("expected a '{}' column, found '{}'", MEAN_PREFIX, c))
        })
        .collect::<Result<Vec<_>>>()?;
    for (name, std_column) in names.iter().zip(std_columns) {
        if std_column.strip_prefix(STD_PREFIX) != Some(name.as_str()) {
            bail!(
                "column '{}' does not match '{}{}' in {}",
                std_column,
                STD_PREFIX,
                name,
                path.display()
            );
        }
    }

    let catalog = FeatureCatalog::from_ordered(names)?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let raw_id = record.get(0).unwrap_or_default();
        let patient_id = raw_id
            .parse::<PatientId>()
            .with_context(|| format!("Invalid patient id '{}' at row {}", raw_id, row_idx + 1))?;
        let values = record
            .iter()
            .skip(1)
            .map(|field| {
                field
                    .parse::<f64>()
                    .with_context(|| format!("Invalid value '{}' at row {}", field, row_idx + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        samples.push(TabularSample {
            patient_id,
            label: registry.label(patient_id)?,
            values,
        });
    }

    Ok(TabularDataset { catalog, samples })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_round_trips_values_exactly() {
        let catalog = FeatureCatalog::from_names(["b", "a"]);
        let dataset = TabularDataset {
            catalog,
            samples: vec![
                TabularSample {
                    patient_id: 3,
                    label: true,
                    values: vec![1.0, 2.0, 0.1, 0.2],
                },
                TabularSample {
                    patient_id: 5,
                    label: false,
                    values: vec![-3.25, 1e-12, 0.3, 1.0 / 3.0],
                },
            ],
        };
        let registry = PatientRegistry::from_records(vec![(3, true), (5, false)]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        write_feature_table(&path, &dataset).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("patient_id,mean_a,mean_b,std_a,std_b\n"));

        let loaded = read_feature_table(&path, &registry).unwrap();
        assert_eq!(loaded.catalog, dataset.catalog);
        assert_eq!(loaded.samples, dataset.samples);
    }

    #[test]
    fn unlabeled_patient_in_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        std::fs::write(&path, "patient_id,mean_a,std_a\n9,1,2\n").unwrap();
        let registry = PatientRegistry::from_records(vec![(1, true)]).unwrap();
        assert!(read_feature_table(&path, &registry).is_err());
    }
}
