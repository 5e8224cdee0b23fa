use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use helpdesk_core::error::Result;
use helpdesk_core::model::{Attachment, AttachmentKind, AttachmentOwner, NewAttachment};
use helpdesk_core::repository::AttachmentRepository;

use super::PgStore;

/// Column list with the owner id aliased to `owner_id`.
fn columns(kind: AttachmentKind) -> String {
    format!(
        "id, {} AS owner_id, user_id, original_filename, filename, path, mime_type, size, \
         created_at, updated_at",
        kind.owner_column()
    )
}

fn attachment_from_row(kind: AttachmentKind, row: &PgRow) -> Result<Attachment> {
    Ok(Attachment {
        id: row.try_get("id")?,
        kind,
        owner_id: row.try_get("owner_id")?,
        user_id: row.try_get("user_id")?,
        original_filename: row.try_get("original_filename")?,
        filename: row.try_get("filename")?,
        path: row.try_get("path")?,
        mime_type: row.try_get("mime_type")?,
        size: row.try_get("size")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AttachmentRepository for PgStore {
    async fn insert_attachment(&self, attachment: NewAttachment) -> Result<Attachment> {
        let kind = attachment.owner.kind();
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO {} ({}, user_id, original_filename, filename, path, mime_type, size)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            kind.table(),
            kind.owner_column(),
            columns(kind)
        ))
        .bind(attachment.owner.id())
        .bind(attachment.user_id)
        .bind(&attachment.original_filename)
        .bind(&attachment.filename)
        .bind(&attachment.path)
        .bind(&attachment.mime_type)
        .bind(attachment.size)
        .fetch_one(&self.pool)
        .await?;

        attachment_from_row(kind, &row)
    }

    async fn find_attachment(&self, kind: AttachmentKind, id: i64) -> Result<Option<Attachment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = $1",
            columns(kind),
            kind.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(|r| attachment_from_row(kind, r))
            .transpose()
    }

    async fn attachments_for(&self, owner: AttachmentOwner) -> Result<Vec<Attachment>> {
        let kind = owner.kind();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY created_at ASC, id ASC",
            columns(kind),
            kind.table(),
            kind.owner_column()
        ))
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| attachment_from_row(kind, r)).collect()
    }

    async fn delete_attachment(&self, kind: AttachmentKind, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_alias_owner() {
        assert!(columns(AttachmentKind::Ticket).starts_with("id, ticket_id AS owner_id"));
        assert!(columns(AttachmentKind::Followup).starts_with("id, followup_id AS owner_id"));
    }
}
