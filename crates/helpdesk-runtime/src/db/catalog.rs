//! Role/permission catalog mirroring and maintenance helpers.

use sqlx::PgPool;
use tracing::info;

use helpdesk_core::auth::{Permission, Role};
use helpdesk_core::error::Result;

/// Make the role tables match the built-in catalog.
///
/// Idempotent; grants that are no longer part of a role are revoked.
pub async fn sync_role_catalog(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for permission in Permission::ALL {
        sqlx::query("INSERT INTO permissions (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
    }

    for role in Role::ALL {
        let role_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO roles (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let names: Vec<&str> = role.permissions().iter().map(|p| p.as_str()).collect();

        sqlx::query(
            r#"
            DELETE FROM role_has_permissions rp
            USING permissions p
            WHERE rp.permission_id = p.id
              AND rp.role_id = $1
              AND NOT (p.name = ANY($2))
            "#,
        )
        .bind(role_id)
        .bind(&names)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO role_has_permissions (role_id, permission_id)
            SELECT $1, p.id FROM permissions p WHERE p.name = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(&names)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(
        roles = Role::ALL.len(),
        permissions = Permission::ALL.len(),
        "Role catalog synchronized"
    );
    Ok(())
}

/// Tables emptied by [`truncate_all`]; the migration ledger is kept.
pub const TRUNCATED_TABLES: [&str; 10] = [
    "followup_files",
    "ticket_files",
    "followups",
    "tickets",
    "user_has_roles",
    "role_has_permissions",
    "permissions",
    "roles",
    "users",
    "helpdesk_mail_jobs",
];

/// Empty every application table and reset identities.
pub async fn truncate_all(pool: &PgPool) -> Result<()> {
    let sql = format!(
        "TRUNCATE TABLE {} RESTART IDENTITY CASCADE",
        TRUNCATED_TABLES.join(", ")
    );
    sqlx::query(&sql).execute(pool).await?;
    info!(tables = TRUNCATED_TABLES.len(), "Truncated application tables");
    Ok(())
}
