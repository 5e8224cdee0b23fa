use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::notification::{MailOutbox, OutboundMail, Recipient};

/// A queued message.
#[derive(Debug, Clone)]
pub struct MailJob {
    pub id: Uuid,
    pub mail: OutboundMail,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl MailJob {
    pub fn new(mail: OutboundMail, max_attempts: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mail,
            attempts: 0,
            max_attempts,
            last_error: None,
            scheduled_at: now,
            created_at: now,
        }
    }

    /// Whether another attempt is allowed after the current one fails.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub claimed: u64,
    pub sent: u64,
    pub dead_letter: u64,
}

/// Worker-side queue operations.
#[async_trait]
pub trait MailQueue: Send + Sync {
    /// Claim up to `limit` due messages for `worker_id`.
    async fn claim(&self, worker_id: Uuid, limit: i64) -> Result<Vec<MailJob>>;

    async fn complete(&self, job_id: Uuid) -> Result<()>;

    /// Reschedule after `retry_delay`, or dead-letter when `None`.
    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_delay: Option<chrono::Duration>,
    ) -> Result<()>;

    /// Return claims older than `stale_threshold` to pending.
    async fn release_stale(&self, stale_threshold: chrono::Duration) -> Result<u64>;
}

/// Outbox table `helpdesk_mail_jobs`.
#[derive(Clone)]
pub struct PgMailOutbox {
    pool: PgPool,
    max_attempts: i32,
}

const JOB_COLUMNS: &str = "id, recipient, subject, body, attempts, max_attempts, last_error, \
                           scheduled_at, created_at";

fn job_from_row(row: &PgRow) -> Result<MailJob> {
    let recipient: serde_json::Value = row.try_get("recipient")?;
    let to: Recipient = serde_json::from_value(recipient)?;
    Ok(MailJob {
        id: row.try_get("id")?,
        mail: OutboundMail {
            to,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
        },
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        last_error: row.try_get("last_error")?,
        scheduled_at: row.try_get("scheduled_at")?,
        created_at: row.try_get("created_at")?,
    })
}

impl PgMailOutbox {
    pub fn new(pool: PgPool, max_attempts: i32) -> Self {
        Self { pool, max_attempts }
    }

    pub async fn insert(&self, job: &MailJob) -> Result<()> {
        let recipient = serde_json::to_value(&job.mail.to)?;
        sqlx::query(
            r#"
            INSERT INTO helpdesk_mail_jobs (
                id, recipient, subject, body, status, attempts, max_attempts,
                scheduled_at, created_at
            ) VALUES ($1, $2, $3, $4, 'pending', $5, $6, $7, $8)
            "#,
        )
        .bind(job.id)
        .bind(recipient)
        .bind(&job.mail.subject)
        .bind(&job.mail.body)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.scheduled_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Dead-lettered messages, newest first.
    pub async fn dead_letters(&self, limit: i64) -> Result<Vec<MailJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM helpdesk_mail_jobs WHERE status = 'dead_letter' \
             ORDER BY failed_at DESC LIMIT $1",
            JOB_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(job_from_row).collect()
    }

    /// Put a dead-lettered message back in the queue with a fresh budget.
    pub async fn retry_dead_letter(&self, job_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE helpdesk_mail_jobs
            SET status = 'pending', attempts = 0, failed_at = NULL, scheduled_at = NOW()
            WHERE id = $1 AND status = 'dead_letter'
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(HelpdeskError::NotFound(format!(
                "No dead-lettered mail with id {}",
                job_id
            )));
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'claimed') AS claimed,
                COUNT(*) FILTER (WHERE status = 'sent') AS sent,
                COUNT(*) FILTER (WHERE status = 'dead_letter') AS dead_letter
            FROM helpdesk_mail_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count = |name: &str| -> Result<u64> {
            let n: i64 = row.try_get(name)?;
            Ok(n.max(0) as u64)
        };
        Ok(QueueStats {
            pending: count("pending")?,
            claimed: count("claimed")?,
            sent: count("sent")?,
            dead_letter: count("dead_letter")?,
        })
    }
}

#[async_trait]
impl MailOutbox for PgMailOutbox {
    async fn enqueue(&self, mail: OutboundMail) -> Result<()> {
        let job = MailJob::new(mail, self.max_attempts);
        self.insert(&job).await?;
        tracing::debug!(job_id = %job.id, to = %job.mail.to.email, "Mail queued");
        Ok(())
    }
}

#[async_trait]
impl MailQueue for PgMailOutbox {
    async fn claim(&self, worker_id: Uuid, limit: i64) -> Result<Vec<MailJob>> {
        let rows = sqlx::query(&format!(
            r#"
            WITH claimable AS (
                SELECT id
                FROM helpdesk_mail_jobs
                WHERE status = 'pending'
                  AND scheduled_at <= NOW()
                ORDER BY scheduled_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE helpdesk_mail_jobs
            SET
                status = 'claimed',
                worker_id = $1,
                claimed_at = NOW(),
                attempts = attempts + 1
            WHERE id IN (SELECT id FROM claimable)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(worker_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE helpdesk_mail_jobs
            SET status = 'sent', sent_at = NOW(), last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        error: &str,
        retry_delay: Option<chrono::Duration>,
    ) -> Result<()> {
        if let Some(delay) = retry_delay {
            sqlx::query(
                r#"
                UPDATE helpdesk_mail_jobs
                SET
                    status = 'pending',
                    worker_id = NULL,
                    claimed_at = NULL,
                    last_error = $2,
                    scheduled_at = NOW() + $3
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .bind(delay)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE helpdesk_mail_jobs
                SET
                    status = 'dead_letter',
                    last_error = $2,
                    failed_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn release_stale(&self, stale_threshold: chrono::Duration) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE helpdesk_mail_jobs
            SET status = 'pending', worker_id = NULL, claimed_at = NULL
            WHERE status = 'claimed'
              AND claimed_at < NOW() - $1
            "#,
        )
        .bind(stale_threshold)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
