use std::sync::Arc;

use helpdesk_core::config::AppConfig;
use helpdesk_core::notification::MailOutbox;
use helpdesk_core::repository::Repositories;

use crate::db::Database;
use crate::lifecycle::{FollowupService, Notifier, TicketService};
use crate::listing::TicketFilterService;
use crate::storage::{AttachmentManager, StorageBackend};

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub tickets: TicketService,
    pub followups: FollowupService,
    pub listing: TicketFilterService,
    pub files: AttachmentManager,
    /// Absent when running over an in-memory store.
    pub database: Option<Database>,
}

impl AppState {
    /// Wire the services over one set of repositories.
    pub fn new(
        repos: Repositories,
        backend: Arc<dyn StorageBackend>,
        outbox: Arc<dyn MailOutbox>,
        app: AppConfig,
    ) -> Self {
        let files = AttachmentManager::new(backend, repos.clone());
        let notifier = Notifier::new(repos.users.clone(), outbox, app);
        Self {
            tickets: TicketService::new(repos.clone(), files.clone(), notifier.clone()),
            followups: FollowupService::new(repos.clone(), files.clone(), notifier),
            listing: TicketFilterService::new(repos.tickets.clone()),
            files,
            repos,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}
