//! PostgreSQL persistence.

mod attachments;
mod catalog;
mod followups;
mod pool;
mod tickets;
mod users;

pub use catalog::{sync_role_catalog, truncate_all};
pub use pool::Database;

use sqlx::PgPool;

/// Name of the partial unique index guarding one solution per ticket.
pub(crate) const ONE_SOLUTION_INDEX: &str = "followups_one_solution_per_ticket";

/// Repository implementation over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// The violated constraint, if `err` is a unique violation.
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}
