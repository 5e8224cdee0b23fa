use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use helpdesk::logging;
use helpdesk_runtime::migrations::{load_migrations_from_dir, MigrationRunner};

use super::{connect, load_config};

/// Manage database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    #[command(subcommand)]
    pub action: MigrateAction,

    /// Directory of extra SQL migrations applied after the built-in schema.
    #[arg(short, long, default_value = "migrations", global = true)]
    pub migrations_dir: String,
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply all pending migrations.
    Up,

    /// Show migration status.
    Status,
}

impl MigrateCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        logging::init_quiet();

        let (db, _) = connect(&config).await?;
        let runner = MigrationRunner::new(db.primary().clone());
        let extra = load_migrations_from_dir(Path::new(&self.migrations_dir))?;

        println!();
        match self.action {
            MigrateAction::Up => {
                println!("  {} Running pending migrations...", style("→").dim());
                runner.run(extra).await?;
                println!("  {} Migrations complete", style("✓").green());
            }

            MigrateAction::Status => {
                let status = runner.status(extra).await?;
                let (applied, pending): (Vec<_>, Vec<_>) =
                    status.into_iter().partition(|m| m.applied);

                if !applied.is_empty() {
                    println!("  {} Applied:", style("✓").green());
                    for m in &applied {
                        println!("    {} {}", style("-").dim(), style(&m.name).cyan());
                    }
                }

                if !pending.is_empty() {
                    if !applied.is_empty() {
                        println!();
                    }
                    println!("  {} Pending:", style("○").yellow());
                    for m in &pending {
                        println!("    {} {}", style("→").dim(), style(&m.name).yellow());
                    }
                }

                println!();
                println!(
                    "  {} {} applied, {} pending",
                    style("ℹ").blue(),
                    applied.len(),
                    pending.len()
                );
            }
        }
        println!();

        db.close().await;
        Ok(())
    }
}
