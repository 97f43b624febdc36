use anyhow::Result;

use mammotex_pipeline::config::PipelineConfig;
use mammotex_pipeline::evaluation::{evaluate_tabular, write_evaluation_report, EvaluationResult};
use mammotex_pipeline::io::read_feature_table;
use mammotex_pipeline::registry::load_labels;
use mammotex_pipeline::splitter::PartitionRecords;

/// Evaluate every configured model on `features.csv` and the recorded partition.
pub fn run(config: &PipelineConfig) -> Result<Vec<EvaluationResult>> {
    let registry = load_labels(&config.labels)?;
    let dataset = read_feature_table(&config.feature_table_path(), &registry)?;

    let records = PartitionRecords::read(&config.train_record_path(), &config.test_record_path())?;
    records.label_balance().log_summary();
    let (train, test) = dataset.partition(&records.partition()?)?;

    let model_dir = config.model_dir();
    let results = evaluate_tabular(&config.evaluation, &train, &test, Some(&model_dir))?;
    write_evaluation_report(&config.evaluation_path(), &results)?;
    log::info!("Wrote evaluation report to {}", config.evaluation_path().display());
    Ok(results)
}
