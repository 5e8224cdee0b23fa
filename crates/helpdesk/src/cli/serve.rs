use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use helpdesk::{logging, Helpdesk};

use super::load_config;

/// Run the helpdesk server.
#[derive(Parser)]
pub struct ServeCommand {
    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory of extra SQL migrations applied after the built-in schema.
    #[arg(long)]
    pub migrations_dir: Option<String>,
}

impl ServeCommand {
    pub async fn execute(self, config_path: &str) -> Result<()> {
        let mut config = load_config(config_path)?;
        logging::init(&config.observability);

        if let Some(port) = self.port {
            config.gateway.port = port;
        }

        println!();
        println!(
            "  {}  v{}",
            style(&config.app.name).bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  {} Listening on {}",
            style("→").dim(),
            style(format!("http://0.0.0.0:{}", config.gateway.port)).cyan()
        );
        println!(
            "  {} Attachments in {}",
            style("→").dim(),
            config.storage.root.display()
        );
        println!();

        info!("Loaded configuration from {}", config_path);

        let mut builder = Helpdesk::builder().config(config);
        if let Some(dir) = self.migrations_dir {
            builder = builder.migrations_dir(dir);
        }
        let helpdesk = builder.build()?;

        helpdesk.run().await?;

        println!("\n  {} Stopped", style("✓").green());
        Ok(())
    }
}
