use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logtap")]
#[command(about = "Resumable, time-bounded log ingestion", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform one ingestion run from the stored checkpoint
    Run {
        /// Print the run outcome as JSON
        #[arg(long)]
        json: bool,
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
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout belongs to the stdout sink, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logtap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = logtap::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run { json }) => execute_run(config_path, json).await?,
        None => execute_run(config_path, false).await?,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logtap::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}

async fn execute_run(
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = logtap::cli::run::run(config_path, json).await?;

    if !outcome.status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
