// VeriRoute CLI - delivery address accuracy validation

mod exit_codes;
mod export;
mod remote;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{
    EXIT_BACKEND_AUTH, EXIT_BACKEND_NOT_AUTH, EXIT_BACKEND_REJECTED, EXIT_BACKEND_TRANSPORT,
    EXIT_RUN_RUNTIME, EXIT_SUCCESS, EXIT_USAGE,
};
use veriroute_client::ApiError;

#[derive(Parser)]
#[command(name = "vroute")]
#[command(about = "Validate delivery addresses against field GPS reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  vroute run january.toml
  vroute run january.toml --json
  vroute run january.toml --remote
  vroute run january.toml --store runs.db --name \"January week 2\"")]
    Run {
        /// Path to the run config file
        config: PathBuf,

        /// Output the JSON report to stdout instead of a human summary
        #[arg(long)]
        json: bool,

        /// Geocode through the backend comparison service instead of locally
        #[arg(long)]
        remote: bool,

        /// SQLite store for results and the geocode cache
        #[arg(long)]
        store: Option<PathBuf>,

        /// Batch name (defaults to the config's name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Validate a run config without executing it
    #[command(after_help = "\
Examples:
  vroute validate january.toml")]
    Validate {
        /// Path to the run config file
        config: PathBuf,
    },

    /// Run through the backend batch API (create, upload, process, fetch)
    Push {
        /// Path to the run config file
        config: PathBuf,

        /// SQLite store for the fetched results
        #[arg(long)]
        store: Option<PathBuf>,

        /// Batch name (defaults to the config's name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Export the most recent run's results as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// SQLite store to read from
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// List finished runs from the store
    History {
        /// SQLite store to read from
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Save backend credentials
    Login {
        /// Backend API base URL
        #[arg(long)]
        api_base: String,

        /// Bearer token (reads VERIROUTE_TOKEN when omitted)
        #[arg(long, env = "VERIROUTE_TOKEN")]
        token: String,
    },

    /// Remove saved backend credentials
    Logout,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            json,
            remote,
            store,
            name,
        } => {
            if remote {
                remote::cmd_run_remote(config, json, store, name)
            } else {
                run::cmd_run(config, json, store, name)
            }
        }
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Push {
            config,
            store,
            name,
        } => remote::cmd_push(config, store, name),
        Commands::Export { output, store } => run::cmd_export(output, store),
        Commands::History { store } => run::cmd_history(store),
        Commands::Login { api_base, token } => remote::cmd_login(api_base, token),
        Commands::Logout => remote::cmd_logout(),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            eprintln!("error: {}", message);
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_RUN_RUNTIME,
            message: msg.into(),
            hint: None,
        }
    }

    /// Map a backend error to its exit code and operator hint.
    pub fn backend(err: ApiError) -> Self {
        let (code, hint) = match &err {
            ApiError::NotAuthenticated => (
                EXIT_BACKEND_NOT_AUTH,
                Some("run `vroute login --api-base <url>` first".to_string()),
            ),
            ApiError::Unauthorized => (
                EXIT_BACKEND_AUTH,
                Some("your session expired; log in again".to_string()),
            ),
            ApiError::Network(_) => (
                EXIT_BACKEND_TRANSPORT,
                Some("retry the whole run once the backend is reachable".to_string()),
            ),
            ApiError::Validation(_) | ApiError::Http(..) | ApiError::Parse(_) => {
                (EXIT_BACKEND_REJECTED, None)
            }
        };
        Self {
            code,
            message: err.to_string(),
            hint,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Default store location when --store is not given.
pub fn default_store_path() -> Result<PathBuf, CliError> {
    let dir = dirs::data_dir()
        .ok_or_else(|| CliError::runtime("could not determine data directory"))?
        .join("veriroute");
    std::fs::create_dir_all(&dir)
        .map_err(|e| CliError::runtime(format!("cannot create {}: {e}", dir.display())))?;
    Ok(dir.join("veriroute.db"))
}
