use anyhow::{Context, Result};
use clap::Parser;

use helpdesk::logging;
use helpdesk_core::config::AuthConfig;
use helpdesk_core::repository::UserRepository;
use helpdesk_runtime::gateway::TokenIssuer;

use super::{connect, load_config};

/// Mint a bearer token for an existing user. Prints only the token so the
/// output can be captured by scripts.
#[derive(Parser)]
pub struct TokenCommand {
    #[arg(long)]
    pub user_id: i64,

    /// Token lifetime (defaults to `security.auth.session_ttl_secs`).
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}

impl TokenCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        logging::init_quiet();

        let auth = AuthConfig {
            session_ttl_secs: self.ttl_secs.unwrap_or(config.security.auth.session_ttl_secs),
            ..config.security.auth.clone()
        };
        let issuer = TokenIssuer::from_config(&auth)?;

        let (db, store) = connect(&config).await?;
        let actor = store
            .load_actor(self.user_id)
            .await?
            .with_context(|| format!("No user with id {}", self.user_id))?;
        db.close().await;

        let roles: Vec<String> = actor.roles().map(|r| r.to_string()).collect();
        let token = issuer.issue(actor.user(), &roles)?;
        println!("{}", token);
        Ok(())
    }
}
