use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use modeldb_harvester::checkpoint::{CheckpointGuard, SharedCheckpoint};
use modeldb_harvester::config::ConfigLoader;
use modeldb_harvester::error::HarvestError;
use modeldb_harvester::harvest::{HarvestSettings, Harvester};
use modeldb_harvester::interrupt;
use modeldb_harvester::modeldb::ModelDbHttpClient;
use modeldb_harvester::output::JsonOutput;
use modeldb_harvester::progress::TerminalProgress;
use modeldb_harvester::store::Store;

#[derive(Parser)]
#[command(name = "modeldb-harvest")]
#[command(about = "Download ModelDB metadata and zip files, resuming from the last checkpoint")]
#[command(version)]
struct Cli {
    #[arg(long, help = "JSON config file (defaults to ./modeldb-harvest.json when present)")]
    config: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::MissingConfig(_)
        | HarvestError::ConfigRead(_)
        | HarvestError::ConfigParse(_) => 2,
        HarvestError::Http(_)
        | HarvestError::Status { .. }
        | HarvestError::RetriesExhausted { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let progress = TerminalProgress::new();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(progress.log_writer())
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    let client = ModelDbHttpClient::new(&config)?;
    let harvester = Harvester::new(
        client,
        Store::new(&config),
        HarvestSettings::from_config(&config),
    );

    let ids = harvester.list_models()?;

    let checkpoint = SharedCheckpoint::load(&config.checkpoint_path)?;
    info!(
        path = %config.checkpoint_path,
        records = checkpoint.len(),
        "loaded checkpoint"
    );
    let guard = CheckpointGuard::arm(checkpoint.clone());
    interrupt::install(checkpoint.clone())?;

    let summary = harvester.harvest(&ids, &checkpoint, &progress)?;
    guard.finish()?;

    JsonOutput::print_summary(&summary).map_err(|err| HarvestError::Filesystem(err.to_string()))?;
    Ok(())
}
