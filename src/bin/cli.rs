//! Railbox Export CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use railbox::{
    auth::{CaptchaSolver, CommandSolver, CredentialSet, SharedCredentials},
    error::Result,
    models::Config,
    pipeline,
    services::{HttpTransport, Transport},
};

/// railbox - Loaded-box export automation
#[derive(Parser, Debug)]
#[command(
    name = "railbox",
    version,
    about = "Loaded-box export automation for the rail logistics portal"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the day's export and split it per booking partner
    Run {
        /// Target day YYYY-MM-DD (overrides the config)
        #[arg(long)]
        day: Option<String>,
    },

    /// Fetch the day's export without splitting it
    Fetch {
        /// Target day YYYY-MM-DD (overrides the config)
        #[arg(long)]
        day: Option<String>,
    },

    /// Split an already-downloaded export
    Split {
        /// Input spreadsheet (default: the day's export path)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Log in and install fresh credentials
    Login,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn connect(
    config: &Config,
) -> Result<(Arc<dyn Transport>, SharedCredentials, Arc<dyn CaptchaSolver>)> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
    let credentials =
        CredentialSet::from_env(&config.login_api.token_env, &config.login_api.cookie_env)
            .into_shared();
    let solver: Arc<dyn CaptchaSolver> = Arc::new(CommandSolver::new(
        config.login_api.captcha.solver_command.clone(),
    ));
    Ok((transport, credentials, solver))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("railbox starting...");

    let mut config = Config::load_or_default(&cli.config);

    if let Command::Run { day: Some(day) } | Command::Fetch { day: Some(day) } = &cli.command {
        config.run.target_day = day.clone();
    }

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    match cli.command {
        Command::Run { .. } => {
            let (transport, credentials, solver) = connect(&config)?;
            pipeline::run_all(&config, transport, &credentials, solver).await?;
        }

        Command::Fetch { .. } => {
            let (transport, credentials, solver) = connect(&config)?;
            let out = pipeline::run_fetch(&config, transport, &credentials, solver).await?;
            log::info!("Export saved to {}", out.display());
        }

        Command::Split { input } => {
            let input =
                input.unwrap_or_else(|| config.run.export_path(&config.run.resolved_day()));
            let outputs = pipeline::run_split(&config, &input)?;
            for (partition, path) in &outputs {
                log::info!("{} -> {}", partition, path.display());
            }
            log::info!("Split {} into {} files", input.display(), outputs.len());
        }

        Command::Login => {
            let (transport, credentials, solver) = connect(&config)?;
            pipeline::run_login(&config, transport, &credentials, solver).await?;
            let creds = credentials.lock().await;
            log::info!(
                "Credentials installed (token {} chars, cookie {} chars)",
                creds.token().map(str::len).unwrap_or(0),
                creds.cookie_header().len()
            );
        }

        Command::Validate => {
            log::info!("Config OK");
        }
    }

    log::info!("Done!");

    Ok(())
}
