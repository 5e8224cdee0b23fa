//! Migration runner.
//!
//! Concurrent starts are serialized with a PostgreSQL advisory lock, so only
//! one process applies pending migrations.

use helpdesk_core::error::{HelpdeskError, Result};
use sqlx::PgPool;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Advisory lock key ("HLPDSK" in ASCII).
const MIGRATION_LOCK_ID: i64 = 0x484C_5044_534B;

/// A single migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique name, e.g. `0001_helpdesk_schema`.
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Applied/pending state of one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub name: String,
    pub applied: bool,
}

/// Applies built-in migrations followed by any extra ones.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations while holding the advisory lock.
    pub async fn run(&self, extra: Vec<Migration>) -> Result<()> {
        self.acquire_lock().await?;

        let result = self.run_migrations_inner(extra).await;

        if let Err(e) = self.release_lock().await {
            warn!(error = %e, "Failed to release migration lock");
        }

        result
    }

    /// Every known migration and whether it has been applied.
    pub async fn status(&self, extra: Vec<Migration>) -> Result<Vec<MigrationStatus>> {
        self.ensure_migrations_table().await?;
        let applied = self.get_applied_migrations().await?;

        Ok(super::builtin::get_builtin_migrations()
            .into_iter()
            .chain(extra)
            .map(|m| MigrationStatus {
                applied: applied.contains(&m.name),
                name: m.name,
            })
            .collect())
    }

    async fn run_migrations_inner(&self, extra: Vec<Migration>) -> Result<()> {
        self.ensure_migrations_table().await?;

        let applied = self.get_applied_migrations().await?;
        debug!(?applied, "Already applied migrations");

        let mut count = 0;
        for migration in super::builtin::get_builtin_migrations().into_iter().chain(extra) {
            if !applied.contains(&migration.name) {
                self.apply_migration(&migration).await?;
                count += 1;
            }
        }

        if count == 0 {
            debug!("Schema is up to date");
        }
        Ok(())
    }

    async fn acquire_lock(&self) -> Result<()> {
        debug!("Acquiring migration lock...");
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                HelpdeskError::Database(format!("Failed to acquire migration lock: {}", e))
            })?;
        debug!("Migration lock acquired");
        Ok(())
    }

    async fn release_lock(&self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                HelpdeskError::Database(format!("Failed to release migration lock: {}", e))
            })?;
        debug!("Migration lock released");
        Ok(())
    }

    async fn ensure_migrations_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS helpdesk_migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) UNIQUE NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            HelpdeskError::Database(format!("Failed to create migrations table: {}", e))
        })?;
        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM helpdesk_migrations")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                HelpdeskError::Database(format!("Failed to get applied migrations: {}", e))
            })?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Statements and the tracking row commit together.
    async fn apply_migration(&self, migration: &Migration) -> Result<()> {
        info!(migration = %migration.name, "Applying migration");

        let mut tx = self.pool.begin().await?;

        for statement in split_sql_statements(&migration.sql) {
            if is_comment_only(&statement) {
                continue;
            }

            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    HelpdeskError::Database(format!(
                        "Failed to apply migration '{}': {}",
                        migration.name, e
                    ))
                })?;
        }

        sqlx::query("INSERT INTO helpdesk_migrations (name) VALUES ($1)")
            .bind(&migration.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                HelpdeskError::Database(format!(
                    "Failed to record migration '{}': {}",
                    migration.name, e
                ))
            })?;

        tx.commit().await?;

        info!(migration = %migration.name, "Migration applied");
        Ok(())
    }
}

fn is_comment_only(statement: &str) -> bool {
    statement.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with("--")
    })
}

/// Split SQL into statements, keeping `;` inside dollar-quoted bodies.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut dollar_tag: Option<String> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);

        if c == '$' {
            let mut tag = String::from("$");
            while let Some(&next) = chars.peek() {
                if next == '$' {
                    chars.next();
                    tag.push('$');
                    current.push('$');
                    break;
                } else if next.is_alphanumeric() || next == '_' {
                    chars.next();
                    tag.push(next);
                    current.push(next);
                } else {
                    break;
                }
            }

            if tag.len() >= 2 && tag.ends_with('$') {
                match &dollar_tag {
                    Some(open) if *open == tag => dollar_tag = None,
                    None => dollar_tag = Some(tag),
                    Some(_) => {}
                }
            }
        }

        if c == ';' && dollar_tag.is_none() {
            push_statement(&mut statements, &current);
            current.clear();
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let stmt = raw.trim().trim_end_matches(';').trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}

/// Load extra migrations from a directory of `NNNN_name.sql` files, sorted
/// by name.
pub fn load_migrations_from_dir(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.exists() {
        debug!(?dir, "Migrations directory does not exist");
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|e| e == "sql") {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| HelpdeskError::Config("Invalid migration filename".into()))?
                .to_string();

            let sql = std::fs::read_to_string(&path)?;
            migrations.push(Migration::new(name, sql));
        }
    }

    migrations.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(count = migrations.len(), "Loaded migrations from directory");
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_migrations_from_nonexistent_dir() {
        let migrations = load_migrations_from_dir(Path::new("/nonexistent/path")).unwrap();
        assert!(migrations.is_empty());
    }

    #[test]
    fn test_load_migrations_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();

        fs::write(dir.path().join("0102_second.sql"), "SELECT 2;").unwrap();
        fs::write(dir.path().join("0101_first.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("notes.txt"), "Not a migration").unwrap();
        fs::write(dir.path().join("0103_old.sql.bak"), "Backup").unwrap();

        let migrations = load_migrations_from_dir(dir.path()).unwrap();
        let names: Vec<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["0101_first", "0102_second"]);
    }

    #[test]
    fn test_split_simple_statements() {
        let stmts = split_sql_statements("SELECT 1; SELECT 2;\nSELECT 3");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_split_keeps_dollar_quoted_body() {
        let sql = r#"
CREATE FUNCTION touch_updated_at() RETURNS trigger AS $body$
BEGIN
    NEW.updated_at := NOW();
    RETURN NEW;
END;
$body$ LANGUAGE plpgsql;

SELECT 3;
"#;
        let stmts = split_sql_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("NEW.updated_at := NOW();"));
        assert!(stmts[0].ends_with("LANGUAGE plpgsql"));
        assert_eq!(stmts[1], "SELECT 3");
    }

    #[test]
    fn test_positional_parameters_are_not_tags() {
        let stmts = split_sql_statements("SELECT $1; SELECT $2");
        assert_eq!(stmts, vec!["SELECT $1", "SELECT $2"]);
    }

    #[test]
    fn test_comment_only_detection() {
        assert!(is_comment_only("-- just a note\n\n-- another"));
        assert!(!is_comment_only("-- note\nSELECT 1"));
    }
}
