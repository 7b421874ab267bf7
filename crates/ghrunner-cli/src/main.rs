//! ghrunner CLI - ephemeral self-hosted runners for GitHub Actions.

mod logging;
mod runners;

use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use ghrunner_core::{Repository, RunId};
use ghrunner_github::{GitHubClient, DEFAULT_API_URL};
use ghrunner_tend::{tend, ConfigError, RunnerConfig, Session, TendError};
use runners::{list_runners, remove_runners};

/// ghrunner - Ephemeral self-hosted runner controller
#[derive(Parser)]
#[command(name = "ghrunner", version)]
#[command(about = "Provision one ephemeral self-hosted runner per queued job", long_about = None)]
struct Cli {
    /// Enable debug logs
    #[arg(long, global = true)]
    debug: bool,

    /// Print logs as GitHub Actions workflow commands
    #[arg(long = "github-actions", global = true, env = "GITHUB_ACTIONS")]
    github_actions: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage self-hosted runners of a repository
    Runner {
        #[command(flatten)]
        github: GitHubArgs,

        #[command(subcommand)]
        command: RunnerCommands,
    },
}

#[derive(Args)]
struct GitHubArgs {
    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Repository owner
    #[arg(long, env = "GITHUB_REPOSITORY_OWNER")]
    github_repo_owner: String,

    /// Repository name
    #[arg(long, env = "GITHUB_REPO_NAME")]
    github_repo_name: String,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    github_api_url: String,
}

#[derive(Subcommand)]
enum RunnerCommands {
    /// Create and remove runners for the queued jobs of a workflow run
    Tend {
        /// Workflow run to tend
        #[arg(long = "github-workflow-run-id", env = "GITHUB_RUN_ID")]
        run_id: u64,

        /// Runner configuration file (read from stdin when omitted)
        #[arg(long)]
        conf: Option<PathBuf>,
    },

    /// List runners carrying a label
    List {
        /// Runner label
        #[arg(long)]
        label: String,
    },

    /// Remove every runner carrying a label
    Remove {
        /// Runner label
        #[arg(long)]
        label: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(cli.debug, cli.github_actions)?;

    match cli.command {
        Commands::Runner { github, command } => {
            let repository = Repository::new(github.github_repo_owner, github.github_repo_name);
            let client =
                GitHubClient::new(&github.github_api_url, github.github_token, repository)?;

            match command {
                RunnerCommands::Tend { run_id, conf } => {
                    tend_run(client, RunId::new(run_id), conf.as_deref()).await?;
                }
                RunnerCommands::List { label } => {
                    list_runners(&client, &label).await?;
                }
                RunnerCommands::Remove { label } => {
                    remove_runners(&client, &label).await?;
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, repository: &Repository) -> Result<RunnerConfig, ConfigError> {
    match path {
        Some(path) => RunnerConfig::parse(File::open(path)?, repository),
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                return Err(ConfigError::Missing);
            }
            RunnerConfig::parse(stdin.lock(), repository)
        }
    }
}

async fn tend_run(
    client: GitHubClient,
    run_id: RunId,
    conf: Option<&Path>,
) -> Result<(), TendError> {
    let config = load_config(conf, client.repository())?;
    info!(runners = config.runners().len(), "Loaded runner configuration");

    let session = Session::new(Arc::new(client), config.timings());
    tend(&session, run_id, &config).await?;

    info!(run_id = %run_id, "Workflow run tended");
    Ok(())
}
