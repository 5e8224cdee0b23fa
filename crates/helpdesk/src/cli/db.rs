use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::Confirm;

use helpdesk::logging;
use helpdesk_runtime::db::truncate_all;

use super::{connect, load_config};

/// Database maintenance.
#[derive(Parser)]
pub struct DbCommand {
    #[command(subcommand)]
    pub action: DbAction,
}

#[derive(Subcommand)]
pub enum DbAction {
    /// Empty every application table. Stored files are left in place.
    Truncate {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

impl DbCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        logging::init_quiet();

        match self.action {
            DbAction::Truncate { yes } => {
                if !yes {
                    let confirmed = Confirm::new()
                        .with_prompt("This deletes every ticket, followup and user. Continue?")
                        .default(false)
                        .interact()?;
                    if !confirmed {
                        println!("  {} Aborted", style("ℹ").blue());
                        return Ok(());
                    }
                }

                let (db, _) = connect(&config).await?;
                truncate_all(db.primary()).await?;
                db.close().await;
                println!("  {} All tables truncated", style("✓").green());
            }
        }
        Ok(())
    }
}
