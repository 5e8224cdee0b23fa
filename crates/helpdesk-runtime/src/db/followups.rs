use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::model::{Followup, NewFollowup};
use helpdesk_core::repository::FollowupRepository;

use super::{unique_violation, PgStore, ONE_SOLUTION_INDEX};

const FOLLOWUP_COLUMNS: &str = "id, ticket_id, user_id, type, content, created_at, updated_at";

fn followup_from_row(row: &PgRow) -> Result<Followup> {
    let kind: String = row.try_get("type")?;
    Ok(Followup {
        id: row.try_get("id")?,
        ticket_id: row.try_get("ticket_id")?,
        user_id: row.try_get("user_id")?,
        kind: kind.parse()?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl FollowupRepository for PgStore {
    async fn insert_followup(&self, followup: NewFollowup) -> Result<Followup> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO followups (ticket_id, user_id, type, content)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            FOLLOWUP_COLUMNS
        ))
        .bind(followup.ticket_id)
        .bind(followup.user_id)
        .bind(followup.kind.as_str())
        .bind(&followup.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some(ONE_SOLUTION_INDEX) => HelpdeskError::DuplicateSolution,
            _ => HelpdeskError::Sql(e),
        })?;

        followup_from_row(&row)
    }

    async fn find_followup(&self, id: i64) -> Result<Option<Followup>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM followups WHERE id = $1",
            FOLLOWUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(followup_from_row).transpose()
    }

    async fn followups_for_ticket(&self, ticket_id: i64) -> Result<Vec<Followup>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM followups WHERE ticket_id = $1 ORDER BY created_at ASC, id ASC",
            FOLLOWUP_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(followup_from_row).collect()
    }

    async fn has_solution(&self, ticket_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM followups WHERE ticket_id = $1 AND type = 'solution')",
        )
        .bind(ticket_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn update_followup_content(&self, id: i64, content: &str) -> Result<Option<Followup>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE followups SET content = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            FOLLOWUP_COLUMNS
        ))
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(followup_from_row).transpose()
    }

    async fn delete_followup(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM followups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
