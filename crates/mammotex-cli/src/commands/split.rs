use std::collections::BTreeSet;

use anyhow::Result;

use mammotex_pipeline::aggregate::sample_locations;
use mammotex_pipeline::config::PipelineConfig;
use mammotex_pipeline::io::read_feature_table;
use mammotex_pipeline::registry::{load_labels, PatientId};
use mammotex_pipeline::splitter::{split_patients, PartitionRecords};

use super::ensure_output_dir;

/// Split the patient population and write both partition records.
///
/// The population is taken from `features.csv` when it exists, so that only
/// patients with at least one aggregated sample are split; otherwise every
/// patient directory under the data directory counts.
pub fn run(config: &PipelineConfig) -> Result<PartitionRecords> {
    let registry = load_labels(&config.labels)?;

    let table_path = config.feature_table_path();
    let population: BTreeSet<PatientId> = if table_path.exists() {
        log::info!("Taking the patient population from {}", table_path.display());
        read_feature_table(&table_path, &registry)?.patient_ids()
    } else {
        log::info!(
            "Taking the patient population from {}",
            config.data_dir.display()
        );
        sample_locations(&config.data_dir)?
            .into_iter()
            .map(|location| location.patient_id)
            .collect()
    };

    let partition = split_patients(&population, config.split.train_fraction, config.split.seed)?;
    let records = partition.records(&registry)?;

    ensure_output_dir(&config.output_dir)?;
    records.write(&config.train_record_path(), &config.test_record_path())?;
    records.label_balance().log_summary();
    Ok(records)
}
