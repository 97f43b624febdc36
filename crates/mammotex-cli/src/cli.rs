//! Argument definitions and configuration resolution.
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};

use mammotex_pipeline::config::{load_pipeline_config, ModelConfig, ModelType, PipelineConfig};

/// Arguments shared by every subcommand.
fn common_args() -> Vec<Arg> {
    vec![
        Arg::new("config")
            .help("Path to the pipeline JSON configuration file. Defaults are used when omitted.")
            .required(false)
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("data_dir")
            .short('d')
            .long("data-dir")
            .help("Base directory of <patient_id>/<sample>/ directories. Overrides the configuration file.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("labels")
            .short('l')
            .long("labels")
            .help("Label table with patient_id and case_status columns. Overrides the configuration file.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("output_dir")
            .short('o')
            .long("output-dir")
            .help("Directory that tables, partition records, arrays and models are written to.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::DirPath),
        Arg::new("seed")
            .long("seed")
            .help("Seed of the patient-level split.")
            .value_parser(clap::value_parser!(u64)),
        Arg::new("train_fraction")
            .long("train-fraction")
            .help("Fraction of patients assigned to the training partition.")
            .value_parser(clap::value_parser!(f64)),
    ]
}

fn model_args() -> Vec<Arg> {
    vec![
        Arg::new("model_type")
            .long("model-type")
            .help("Evaluate only this model type instead of the configured list.")
            .value_parser(["gbdt", "logistic"])
            .value_hint(ValueHint::Other),
        Arg::new("no_scale")
            .long("no-scale")
            .help("Disable standard scaling ahead of the classifiers.")
            .action(ArgAction::SetTrue),
    ]
}

pub fn build_cli() -> Command {
    Command::new("mammotex")
        .version(clap::crate_version!())
        .about("Patient-aware aggregation, splitting and evaluation of mammographic texture features")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("aggregate")
                .about("Aggregate per-sample mean/std statistics into features.csv")
                .args(common_args()),
        )
        .subcommand(
            Command::new("split")
                .about("Split patients into train/test partitions and record them")
                .args(common_args()),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Fit and score every configured model on the recorded partition")
                .args(common_args())
                .args(model_args()),
        )
        .subcommand(
            Command::new("tensors")
                .about("Build cropped, masked, normalized tensors and export them as .npy")
                .args(common_args()),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}

/// Load the configuration named by the `config` argument (or the defaults)
/// and apply command line overrides.
pub fn resolve_config(matches: &ArgMatches) -> Result<PipelineConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            load_pipeline_config(path)?
        }
        None => {
            log::info!("No config provided; using defaults.");
            PipelineConfig::default()
        }
    };

    if let Some(data_dir) = matches.get_one::<PathBuf>("data_dir") {
        config.data_dir = data_dir.clone();
    }
    if let Some(labels) = matches.get_one::<PathBuf>("labels") {
        config.labels.path = labels.clone();
    }
    if let Some(output_dir) = matches.get_one::<PathBuf>("output_dir") {
        config.output_dir = output_dir.clone();
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        config.split.seed = *seed;
    }
    if let Some(fraction) = matches.get_one::<f64>("train_fraction") {
        config.split.train_fraction = *fraction;
    }

    if has_arg(matches, "model_type") {
        if let Some(model_type) = matches.get_one::<String>("model_type") {
            let model_type = ModelType::from_str(model_type).map_err(anyhow::Error::msg)?;
            config.evaluation.models = vec![ModelConfig::new(0.1, model_type)];
        }
    }
    if has_arg(matches, "no_scale") && matches.get_flag("no_scale") {
        config.evaluation.scale_features = false;
    }

    if matches.get_one::<PathBuf>("config").is_none() {
        let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
        log::debug!("Effective config:\n{}", default_json);
    }
    Ok(config)
}

fn has_arg(matches: &ArgMatches, id: &str) -> bool {
    matches.try_contains_id(id).is_ok()
}
