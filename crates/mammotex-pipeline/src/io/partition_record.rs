//! Partition record files: `patient_id,case_status`, one row per patient.
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::error::PipelineError;
use crate::registry::{parse_case_status, PatientId};

pub const RECORD_HEADER: [&str; 2] = ["patient_id", "case_status"];

/// Write `(patient_id, label)` rows in the order given.
pub fn write_partition_record(path: &Path, records: &[(PatientId, bool)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create partition record: {}", path.display()))?;
    writer.write_record(RECORD_HEADER)?;
    for (patient_id, label) in records {
        writer.write_record([patient_id.to_string(), u8::from(*label).to_string()])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write partition record: {}", path.display()))?;
    Ok(())
}

pub fn read_partition_record(path: &Path) -> Result<Vec<(PatientId, bool)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open partition record: {}", path.display()))?;

    let headers = reader.headers()?.clone();
    if headers.iter().collect::<Vec<_>>() != RECORD_HEADER {
        bail!(
            "partition record {} must have header '{}'",
            path.display(),
            RECORD_HEADER.join(",")
        );
    }

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let raw_id = record.get(0).unwrap_or_default();
        let patient_id = raw_id
            .parse::<PatientId>()
            .with_context(|| format!("Invalid patient id '{}' at row {}", raw_id, row_idx + 1))?;
        let raw_label = record.get(1).unwrap_or_default();
        let label = parse_case_status(raw_label).ok_or_else(|| PipelineError::InvalidLabel {
            patient: raw_id.to_string(),
            value: raw_label.to_string(),
        })?;
        records.push((patient_id, label));
    }
    Ok(records)
}
