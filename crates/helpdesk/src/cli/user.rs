use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

use helpdesk::logging;
use helpdesk_core::auth::Role;
use helpdesk_core::model::NewUser;
use helpdesk_core::repository::UserRepository;

use super::{connect, load_config};

/// Manage users. Credentials live with the identity provider; this only
/// records the user and their role.
#[derive(Parser)]
pub struct UserCommand {
    #[command(subcommand)]
    pub action: UserAction,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a user with a role.
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// `admin` or `user`.
        #[arg(long, default_value = "user")]
        role: Role,
    },
}

impl UserCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        logging::init_quiet();

        let (db, store) = connect(&config).await?;

        match self.action {
            UserAction::Add { name, email, role } => {
                let user = store.create_user(NewUser { name, email }, role).await?;
                println!(
                    "  {} Created user #{} {} <{}> as {}",
                    style("✓").green(),
                    user.id,
                    style(&user.name).cyan(),
                    user.email,
                    role
                );
            }
        }

        db.close().await;
        Ok(())
    }
}
