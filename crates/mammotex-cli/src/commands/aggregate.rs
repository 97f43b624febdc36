use anyhow::Result;

use mammotex_pipeline::aggregate::{aggregate_tabular, reference_sample_dir};
use mammotex_pipeline::catalog::discover_feature_names;
use mammotex_pipeline::config::PipelineConfig;
use mammotex_pipeline::data_handling::TabularDataset;
use mammotex_pipeline::io::write_feature_table;
use mammotex_pipeline::registry::load_labels;

use super::ensure_output_dir;

/// Aggregate every sample under the data directory and write `features.csv`.
pub fn run(config: &PipelineConfig) -> Result<TabularDataset> {
    let registry = load_labels(&config.labels)?;
    let reference = reference_sample_dir(&config.data_dir)?;
    let catalog = discover_feature_names(&reference, &config.naming)?;

    let dataset = aggregate_tabular(&config.data_dir, &registry, &catalog, &config.naming)?;

    ensure_output_dir(&config.output_dir)?;
    write_feature_table(&config.feature_table_path(), &dataset)?;
    Ok(dataset)
}
