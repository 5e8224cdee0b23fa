use anyhow::Result;
use clap::Parser;
use console::style;

use helpdesk::logging;
use helpdesk_core::auth::Role;
use helpdesk_runtime::db::sync_role_catalog;

use super::{connect, load_config};

/// Create the roles and permissions and grant each role its fixed set.
/// Safe to run repeatedly.
#[derive(Parser)]
pub struct SeedCommand {}

impl SeedCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        logging::init_quiet();

        let (db, _) = connect(&config).await?;
        sync_role_catalog(db.primary()).await?;

        println!();
        for role in Role::ALL {
            println!(
                "  {} {} ({} permissions)",
                style("✓").green(),
                style(role).cyan(),
                role.permissions().len()
            );
        }
        println!();

        db.close().await;
        Ok(())
    }
}
