use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ecoportal_ingest::app::{self, ImportOptions};
use ecoportal_ingest::config::ConfigLoader;
use ecoportal_ingest::error::IngestError;

#[derive(Parser)]
#[command(name = "eco-ingest")]
#[command(about = "Populate a dataset repository with climate and species reference data")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the repository skeleton")]
    Init(InitArgs),
    #[command(about = "Run the import pipeline")]
    Import(ImportArgs),
    #[command(about = "Delete datasets whose job state is REMOVED")]
    Cleanup(CommonArgs),
    #[command(about = "List stored datasets")]
    List(CommonArgs),
}

#[derive(Args)]
struct InitArgs {
    #[arg(long)]
    config: Option<String>,

    /// Recreate the repository if it already exists.
    #[arg(long)]
    replace: bool,
}

#[derive(Args)]
struct CommonArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(long)]
    config: Option<String>,

    /// Import a small smoke-test subset.
    #[arg(long)]
    test: bool,

    /// Enable every known source.
    #[arg(long)]
    all: bool,

    /// Enable one source by name (repeatable).
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Keep only these climate models (repeatable).
    #[arg(long)]
    gcm: Vec<String>,

    /// Keep only these emission scenarios (repeatable).
    #[arg(long)]
    emsc: Vec<String>,

    /// Keep only these projection years (repeatable).
    #[arg(long)]
    year: Vec<String>,

    /// Public portal base URL used to build download links.
    #[arg(long)]
    site_url: Option<String>,

    /// Commit after this many created objects.
    #[arg(long)]
    commit_every: Option<usize>,

    /// Raster conversion program.
    #[arg(long)]
    converter: Option<String>,

    /// Enumerate and log without downloading or writing anything.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = map_exit_code(&err);
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(code)
        }
    }
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::UnknownSource(_)
        | IngestError::UnknownEmissionScenario(_)
        | IngestError::MissingConfig(_)
        | IngestError::ConfigRead(_)
        | IngestError::ConfigParse(_)
        | IngestError::RepositoryMissing(_) => 2,
        IngestError::MissingConverter(_) | IngestError::ConversionFailed { .. } => 3,
        IngestError::FetchHttp(_) | IngestError::FetchStatus { .. } => 4,
        _ => 1,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), IngestError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| IngestError::Filesystem(err.to_string()))?;
    println!("{text}");
    Ok(())
}

fn run() -> Result<(), IngestError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let repo = app::run_init(&config.repository, args.replace)?;
            println!("{}", serde_json::json!({ "root": repo.root().as_str() }));
            Ok(())
        }
        Commands::Import(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let options = ImportOptions {
                test: args.test,
                all: args.all,
                sources: args.sources,
                gcm: args.gcm,
                emsc: args.emsc,
                year: args.year,
                site_url: args.site_url,
                commit_every: args.commit_every,
                converter: args.converter,
                dry_run: args.dry_run,
            };
            let result = app::run_import(&config, &options)?;
            print_json(&result)
        }
        Commands::Cleanup(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let result = app::run_cleanup(&config)?;
            print_json(&result)
        }
        Commands::List(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let result = app::run_list(&config)?;
            print_json(&result)
        }
    }
}

#[cfg(test)]
mod tests {
    use ecoportal_ingest::config::{Config, ConfigLoader};

    use super::*;

    #[test]
    fn exit_codes_distinguish_failure_classes() {
        assert_eq!(map_exit_code(&IngestError::UnknownSource("x".to_string())), 2);
        assert_eq!(
            map_exit_code(&IngestError::MissingConfig("eco.json".into())),
            2
        );
        assert_eq!(
            map_exit_code(&IngestError::MissingConverter("gdal_translate".to_string())),
            3
        );
        assert_eq!(
            map_exit_code(&IngestError::ConversionFailed {
                path: "layer.asc".to_string(),
                code: 1,
            }),
            3
        );
        assert_eq!(
            map_exit_code(&IngestError::FetchStatus {
                url: "https://exmpl/x.zip".to_string(),
                status: 500,
            }),
            4
        );
        assert_eq!(map_exit_code(&IngestError::Archive("bad".to_string())), 1);
    }

    #[test]
    fn failing_import_reaches_the_usage_exit_code() {
        let config = ConfigLoader::resolve_config(Config::default()).unwrap();
        let options = ImportOptions {
            sources: vec!["atlantis-10km".to_string()],
            dry_run: true,
            ..ImportOptions::default()
        };
        let err = app::run_import(&config, &options).unwrap_err();
        assert_eq!(map_exit_code(&err), 2);
    }
}
