mod role;
mod user;

use crate::access::{AccessControl, OperationResult};
use crate::conf::{Config, General, LogFormat};
use crate::storage::Db;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polyfmt::success;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(name = "tabguard")]
#[clap(about = "Tabguard decides which navigation tabs each user of the personnel desktop app may see.")]
#[clap(
    long_about = "Tabguard decides which navigation tabs each user of the personnel desktop app may see.\n\n\
    Administrators define roles as named bundles of tabs and assign them to users. Users that predate roles keep \
    working through their legacy role until they are migrated."
)]
#[clap(version)]
struct Args {
    /// Set configuration path; if empty default paths are used
    #[clap(long, value_name = "PATH")]
    config_path: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand, Clone)]
enum Commands {
    /// Manages roles and the tabs they grant.
    Role(role::RoleSubcommands),

    /// Assigns roles to users and inspects what they can see.
    User(user::UserSubcommands),
}

pub struct Cli {
    args: Args,
    config: Config,
}

/// Everything a subcommand needs once storage is open.
struct CliHarness {
    access: AccessControl,
}

impl Cli {
    /// Parses arguments and configuration and sets up logging. Storage is not touched until [`Cli::run`].
    pub fn new() -> Result<Self> {
        let args = Args::parse();

        let config = Config::load(args.config_path.as_deref())
            .context("Could not load configuration")?;

        init_logging(&config.general)?;

        Ok(Cli { args, config })
    }

    pub async fn run(&self) -> Result<()> {
        let storage = Db::new(
            &self.config.storage.path,
            Duration::from_secs(self.config.storage.busy_timeout),
        )
        .await
        .with_context(|| format!("Could not open database at '{}'", self.config.storage.path))?;

        let harness = CliHarness {
            access: AccessControl::new(storage),
        };

        if self.config.storage.seed_default_roles {
            let created = harness
                .access
                .ensure_default_roles()
                .await
                .context("Could not create default roles")?;
            debug!(created, "Checked default roles");
        }

        match self.args.command.clone() {
            Commands::Role(role) => harness.handle_role_subcommands(role).await,
            Commands::User(user) => harness.handle_user_subcommands(user).await,
        }
    }
}

/// Prints the outcome of a mutating call; a failure becomes an error exit carrying its message.
fn report(result: OperationResult, success_msg: &str) -> Result<()> {
    if result.success {
        success!("{}", success_msg);
        return Ok(());
    }

    anyhow::bail!(result.message.unwrap_or_default())
}

fn init_logging(general: &General) -> Result<()> {
    // RUST_LOG wins over the configured level when present.
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&general.log_level)
            .with_context(|| format!("Invalid log_level '{}'", general.log_level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match general.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Could not initialize logging; {e}"))
}
