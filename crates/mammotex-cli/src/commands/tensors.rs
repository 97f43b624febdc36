use anyhow::Result;

use mammotex_pipeline::aggregate::{aggregate_imaging, reference_sample_dir};
use mammotex_pipeline::catalog::discover_feature_names;
use mammotex_pipeline::config::PipelineConfig;
use mammotex_pipeline::data_handling::ImagingDataset;
use mammotex_pipeline::io::export_tensors;
use mammotex_pipeline::normalize::normalize_datasets;
use mammotex_pipeline::registry::load_labels;
use mammotex_pipeline::splitter::load_or_split;

use super::ensure_output_dir;

/// Aggregate, split, normalize and export imaging tensors.
///
/// An existing partition record is reused so that the imaging and tabular
/// runs share one patient split.
pub fn run(config: &PipelineConfig) -> Result<(ImagingDataset, ImagingDataset)> {
    let registry = load_labels(&config.labels)?;
    let reference = reference_sample_dir(&config.data_dir)?;
    let catalog = discover_feature_names(&reference, &config.naming)?;

    let dataset = aggregate_imaging(
        &config.data_dir,
        &registry,
        &catalog,
        config.imaging.crop_shape(),
        &config.naming,
    )?;

    ensure_output_dir(&config.output_dir)?;
    let records = load_or_split(
        &dataset.patient_ids(),
        &registry,
        config.split.train_fraction,
        config.split.seed,
        &config.train_record_path(),
        &config.test_record_path(),
    )?;
    records.label_balance().log_summary();

    let (mut train, mut test) = dataset.partition(&records.partition()?)?;
    normalize_datasets(&mut train, &mut test, config.imaging.epsilon)?;
    export_tensors(&config.tensor_dir(), &train, &test)?;
    Ok((train, test))
}
