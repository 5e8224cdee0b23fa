pub mod db;
pub mod gateway;
pub mod lifecycle;
pub mod listing;
pub mod mail;
pub mod migrations;
pub mod storage;

pub use db::{Database, PgStore};
pub use gateway::{AppState, AuthMiddleware, GatewayServer, TokenIssuer};
pub use lifecycle::{FollowupService, Notifier, TicketService};
pub use listing::TicketFilterService;
pub use mail::{MailWorker, MailWorkerConfig, PgMailOutbox};
pub use migrations::{get_builtin_migrations, MigrationRunner};
pub use storage::{AttachmentManager, FilesystemBackend};
