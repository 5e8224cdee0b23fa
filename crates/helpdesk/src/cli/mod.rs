mod db;
mod mail;
mod migrate;
mod seed;
mod serve;
mod token;
mod user;

pub use db::DbCommand;
pub use mail::MailCommand;
pub use migrate::MigrateCommand;
pub use seed::SeedCommand;
pub use serve::ServeCommand;
pub use token::TokenCommand;
pub use user::UserCommand;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_runtime::db::{Database, PgStore};

/// Helpdesk ticketing server and admin tools.
#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "helpdesk.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server and mail worker.
    Serve(ServeCommand),

    /// Manage database migrations.
    Migrate(MigrateCommand),

    /// Sync the role and permission catalog.
    Seed(SeedCommand),

    /// Manage users.
    User(UserCommand),

    /// Mint a bearer token for a user.
    Token(TokenCommand),

    /// Database maintenance.
    Db(DbCommand),

    /// Inspect and retry queued mail.
    Mail(MailCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();
        let config = self.config;
        match self.command {
            Commands::Serve(cmd) => cmd.execute(&config).await,
            Commands::Migrate(cmd) => cmd.execute(&config).await,
            Commands::Seed(cmd) => cmd.execute(&config).await,
            Commands::User(cmd) => cmd.execute(&config).await,
            Commands::Token(cmd) => cmd.execute(&config).await,
            Commands::Db(cmd) => cmd.execute(&config).await,
            Commands::Mail(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Read `helpdesk.toml` (with `${VAR}` substitution from the environment).
pub(crate) fn load_config(path: &str) -> Result<HelpdeskConfig> {
    if !Path::new(path).exists() {
        anyhow::bail!("Configuration file not found: {}", path);
    }
    HelpdeskConfig::from_file(path).with_context(|| format!("Failed to load {}", path))
}

/// Connect for a one-shot admin command.
pub(crate) async fn connect(config: &HelpdeskConfig) -> Result<(Database, PgStore)> {
    let db = Database::from_config(&config.database)
        .await
        .context("Failed to connect to the database")?;
    let store = PgStore::new(db.primary().clone());
    Ok((db, store))
}
