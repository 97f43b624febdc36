use anyhow::Result;
use log::LevelFilter;

use mammotex_cli::cli::{build_cli, resolve_config};
use mammotex_cli::commands;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("MAMMOTEX_LOG", "error,mammotex=info"))
        .init();

    let matches = build_cli().get_matches();
    let (name, sub_matches) = match matches.subcommand() {
        Some(pair) => pair,
        None => unreachable!("Subcommand is required by CLI configuration"),
    };
    let config = resolve_config(sub_matches)?;
    log::info!("[mammotex::{}] data: {}", name, config.data_dir.display());

    let outcome = match name {
        "aggregate" => commands::aggregate::run(&config).map(|_| ()),
        "split" => commands::split::run(&config).map(|_| ()),
        "evaluate" => commands::evaluate::run(&config).map(|_| ()),
        "tensors" => commands::tensors::run(&config).map(|_| ()),
        _ => unreachable!(),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("{} failed: {:#}", name, e);
            std::process::exit(1)
        }
    }
}
