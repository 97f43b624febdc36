//! Patient case/control labels.
//!
//! The registry is the single owner of label truth: it is loaded once from the
//! label table and every later component asks it for labels by patient id.
use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};

use crate::config::LabelSource;
use crate::error::PipelineError;

pub type PatientId = i64;

/// Immutable map of patient id to label (`true` = case, `false` = control).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientRegistry {
    labels: BTreeMap<PatientId, bool>,
}

impl PatientRegistry {
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = (PatientId, bool)>,
    {
        let mut labels = BTreeMap::new();
        for (patient_id, label) in records {
            if let Some(previous) = labels.insert(patient_id, label) {
                if previous != label {
                    bail!("conflicting labels for patient {}", patient_id);
                }
            }
        }
        Ok(Self { labels })
    }

    /// Label of `patient_id`, or `PipelineError::MissingLabel`.
    pub fn label(&self, patient_id: PatientId) -> Result<bool> {
        self.labels
            .get(&patient_id)
            .copied()
            .ok_or_else(|| PipelineError::MissingLabel(patient_id).into())
    }

    pub fn contains(&self, patient_id: PatientId) -> bool {
        self.labels.contains_key(&patient_id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatientId, bool)> + '_ {
        self.labels.iter().map(|(&id, &label)| (id, label))
    }

    pub fn num_cases(&self) -> usize {
        self.labels.values().filter(|&&label| label).count()
    }
}

/// Load the label table described by `source`.
pub fn load_labels(source: &LabelSource) -> Result<PatientRegistry> {
    let delimiter = u8::try_from(source.delimiter)
        .map_err(|_| anyhow!("label delimiter must be a single-byte character"))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&source.path)
        .with_context(|| format!("Failed to open label table: {}", source.path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read label table header row")?
        .clone();

    let id_idx = headers
        .iter()
        .position(|h| h == source.patient_id_column)
        .ok_or_else(|| PipelineError::MissingColumn {
            path: source.path.clone(),
            column: source.patient_id_column.clone(),
        })?;
    let label_idx = headers
        .iter()
        .position(|h| h == source.label_column)
        .ok_or_else(|| PipelineError::MissingColumn {
            path: source.path.clone(),
            column: source.label_column.clone(),
        })?;

    let mut records = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read label row {}", row_idx + 1))?;

        let raw_id = record.get(id_idx).unwrap_or_default();
        let patient_id = raw_id
            .parse::<PatientId>()
            .with_context(|| format!("Invalid patient id '{}' at row {}", raw_id, row_idx + 1))?;

        let raw_label = record.get(label_idx).unwrap_or_default();
        let label = parse_case_status(raw_label).ok_or_else(|| PipelineError::InvalidLabel {
            patient: raw_id.to_string(),
            value: raw_label.to_string(),
        })?;

        records.push((patient_id, label));
    }

    let registry = PatientRegistry::from_records(records)?;
    log::info!(
        "Loaded labels for {} patients ({} cases, {} controls) from {}",
        registry.len(),
        registry.num_cases(),
        registry.len() - registry.num_cases(),
        source.path.display()
    );
    Ok(registry)
}

/// Parse a case/control indicator.
pub fn parse_case_status(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "1.0" | "true" | "case" => Some(true),
        "0" | "0.0" | "false" | "control" => Some(false),
        _ => None,
    }
}
