//! Mail outbox, delivery worker and transports.

mod mailer;
mod queue;
mod worker;

pub use mailer::{mailer_from_config, LogMailer, Mailer, SmtpMailer};
pub use queue::{MailJob, MailQueue, PgMailOutbox, QueueStats};
pub use worker::{Delivery, MailWorker, MailWorkerConfig, RetryPolicy, WorkerError};
