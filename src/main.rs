use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Ship newline-delimited JSON log files to CloudWatch Logs", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ship every matching file in the input directory
    Run {
        /// Extract and plan batches without contacting the service
        #[arg(long)]
        dry_run: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logship=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = logship::config::resolve_config_path(cli.config.as_deref());

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Some(Commands::Run { dry_run }) => run(config_path, dry_run).await,
        None => run(config_path, false).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => logship::cli::config::init(stdout),
            ConfigAction::Validate => logship::cli::config::validate(config_path),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: Option<PathBuf>, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let summary = logship::cli::run::run(config_path, dry_run).await?;
    println!(
        "{} {} event(s) from {} file(s) to {}",
        if summary.dry_run { "Planned" } else { "Shipped" },
        summary.events_shipped,
        summary.files_shipped,
        summary.stream
    );
    Ok(())
}
