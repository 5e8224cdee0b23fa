use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use uuid::Uuid;

use helpdesk::logging;
use helpdesk_runtime::mail::PgMailOutbox;

use super::{connect, load_config};

/// Inspect the mail outbox.
#[derive(Parser)]
pub struct MailCommand {
    #[command(subcommand)]
    pub action: MailAction,
}

#[derive(Subcommand)]
pub enum MailAction {
    /// Queue counts by state.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Messages that exhausted their delivery attempts.
    DeadLetters {
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Put a dead-lettered message back in the queue.
    Retry { id: Uuid },
}

impl MailCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let config = load_config(config_path)?;
        logging::init_quiet();

        let (db, _) = connect(&config).await?;
        let outbox = PgMailOutbox::new(db.primary().clone(), config.worker.max_attempts);

        match self.action {
            MailAction::Status { json } => {
                let stats = outbox.stats().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                } else {
                    println!();
                    println!("  {} pending", style(stats.pending).cyan());
                    println!("  {} in flight", style(stats.claimed).cyan());
                    println!("  {} sent", style(stats.sent).green());
                    println!("  {} dead-lettered", style(stats.dead_letter).red());
                    println!();
                }
            }

            MailAction::DeadLetters { limit } => {
                let jobs = outbox.dead_letters(limit).await?;
                if jobs.is_empty() {
                    println!("  {} No dead-lettered mail", style("ℹ").blue());
                }
                for job in jobs {
                    println!(
                        "  {} {} to {} after {} attempts: {}",
                        style(job.id).dim(),
                        style(&job.mail.subject).cyan(),
                        job.mail.to.email,
                        job.attempts,
                        job.last_error.as_deref().unwrap_or("unknown error")
                    );
                }
            }

            MailAction::Retry { id } => {
                outbox.retry_dead_letter(id).await?;
                println!("  {} Requeued {}", style("✓").green(), id);
            }
        }

        db.close().await;
        Ok(())
    }
}
