//! Gantry CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(about = "Event-driven container CI glue", long_about = None)]
struct Cli {
    /// Path to the project configuration
    #[arg(long, env = "GANTRY_CONFIG", default_value = "gantry.kdl")]
    config: String,

    /// Path to the secrets file (a JSON object of string pairs)
    #[arg(long, env = "GANTRY_SECRETS_PATH")]
    secrets: Option<String>,

    /// Host directory mounted as the project source inside job containers
    #[arg(long, env = "GANTRY_WORKSPACE", default_value = ".")]
    workspace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route a trigger event and execute what it resolves to
    Dispatch {
        /// Event source
        #[arg(long, default_value = "brigade.sh/github")]
        source: String,
        /// Event name (e.g. "check_suite:requested", "push")
        #[arg(long)]
        event: String,
        /// Git ref carried by the event
        #[arg(long = "ref")]
        git_ref: Option<String>,
        /// Path to a JSON file with the raw event payload
        #[arg(long)]
        payload: Option<String>,
    },
    /// Run a single registered job by name
    Job {
        /// Job name
        name: String,
        /// Git ref to build against
        #[arg(long = "ref")]
        git_ref: Option<String>,
    },
    /// List registered job names
    Jobs,
    /// Validate a project configuration
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "gantry.kdl")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dispatch {
            source,
            event,
            git_ref,
            payload,
        } => {
            commands::dispatch::run(
                &cli.config,
                cli.secrets.as_deref(),
                &cli.workspace,
                &source,
                &event,
                git_ref,
                payload.as_deref(),
            )
            .await?;
        }
        Commands::Job { name, git_ref } => {
            commands::job::run(
                &cli.config,
                cli.secrets.as_deref(),
                &cli.workspace,
                &name,
                git_ref,
            )
            .await?;
        }
        Commands::Jobs => {
            commands::job::list(&cli.config)?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
    }

    Ok(())
}
