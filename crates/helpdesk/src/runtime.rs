//! The helpdesk server process: migrations, role catalog, HTTP gateway and
//! the mail outbox worker, stopped together on ctrl-c.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::repository::Repositories;
use helpdesk_runtime::db::{sync_role_catalog, Database, PgStore};
use helpdesk_runtime::gateway::{AppState, AuthMiddleware, GatewayServer};
use helpdesk_runtime::mail::{mailer_from_config, MailWorker, MailWorkerConfig, PgMailOutbox};
use helpdesk_runtime::migrations::{load_migrations_from_dir, Migration, MigrationRunner};
use helpdesk_runtime::storage::FilesystemBackend;

/// A configured, not yet started server.
pub struct Helpdesk {
    config: HelpdeskConfig,
    shutdown_tx: broadcast::Sender<()>,
    /// Extra SQL migrations applied after the built-in schema.
    migrations_dir: Option<PathBuf>,
}

impl Helpdesk {
    pub fn builder() -> HelpdeskBuilder {
        HelpdeskBuilder::new()
    }

    pub fn config(&self) -> &HelpdeskConfig {
        &self.config
    }

    /// Run until ctrl-c or [`Helpdesk::shutdown`].
    pub async fn run(self) -> Result<()> {
        tracing::info!("Helpdesk starting");

        self.config.jwt_secret()?;
        let auth = AuthMiddleware::new(&self.config.security.auth);

        let db = Database::from_config(&self.config.database).await?;
        let pool = db.primary().clone();
        tracing::info!("Connected to database");

        let extra = match &self.migrations_dir {
            Some(dir) => load_migrations_from_dir(dir)?,
            None => Vec::<Migration>::new(),
        };
        MigrationRunner::new(pool.clone()).run(extra).await?;
        tracing::info!("Migrations completed");

        sync_role_catalog(&pool).await?;

        let repos = Repositories::from_store(Arc::new(PgStore::new(pool.clone())));
        let outbox = Arc::new(PgMailOutbox::new(
            pool.clone(),
            self.config.worker.max_attempts,
        ));
        let backend = Arc::new(FilesystemBackend::new(self.config.storage.root.clone()));
        tokio::fs::create_dir_all(&self.config.storage.root).await?;

        let state = AppState::new(repos, backend, outbox.clone(), self.config.app.clone())
            .with_database(db.clone());
        let gateway = GatewayServer::new(self.config.gateway.clone(), auth, state);

        let mailer = Arc::from(mailer_from_config(&self.config.mail)?);
        let worker = MailWorker::new(
            MailWorkerConfig::from_config(&self.config.worker, &self.config.mail),
            outbox,
            mailer,
        );

        let mut handles = Vec::new();

        let worker_shutdown = self.shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(worker_shutdown).await {
                tracing::error!(error = %e, "Mail worker error");
            }
        }));
        tracing::info!("Mail worker started");

        let mut gateway_shutdown = self.shutdown_tx.subscribe();
        let port = self.config.gateway.port;
        handles.push(tokio::spawn(async move {
            let signal = async move {
                let _ = gateway_shutdown.recv().await;
            };
            if let Err(e) = gateway.run(signal).await {
                tracing::error!(error = %e, "Gateway server error");
            }
        }));
        tracing::info!(port, "HTTP gateway started");

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("Received shutdown notification");
            }
        }

        tracing::info!("Starting graceful shutdown...");
        let _ = self.shutdown_tx.send(());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Task ended abnormally");
            }
        }

        db.close().await;
        tracing::info!("Helpdesk stopped");
        Ok(())
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// A handle that can stop the server from another task.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }
}

/// Builder for [`Helpdesk`].
#[derive(Default)]
pub struct HelpdeskBuilder {
    config: Option<HelpdeskConfig>,
    migrations_dir: Option<PathBuf>,
}

impl HelpdeskBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: HelpdeskConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Directory of extra `NNNN_name.sql` migrations.
    pub fn migrations_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Helpdesk> {
        let config = self
            .config
            .ok_or_else(|| HelpdeskError::Config("Configuration is required".to_string()))?;

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Helpdesk {
            config,
            shutdown_tx,
            migrations_dir: self.migrations_dir,
        })
    }
}
