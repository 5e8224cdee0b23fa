use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use helpdesk_core::auth::{Actor, Permission, Role};
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::model::{NewUser, User};
use helpdesk_core::repository::UserRepository;

use super::{unique_violation, PgStore};

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Parse catalog names, skipping ones this build does not know.
fn parse_names<T: std::str::FromStr>(names: Vec<String>, what: &str) -> Vec<T> {
    names
        .into_iter()
        .filter_map(|name| match name.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(name = %name, kind = what, "Ignoring unknown catalog entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn load_actor(&self, user_id: i64) -> Result<Option<Actor>> {
        let Some(user) = self.find_user(user_id).await? else {
            return Ok(None);
        };

        let roles: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM roles r
            JOIN user_has_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let permissions: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.name
            FROM permissions p
            JOIN role_has_permissions rp ON rp.permission_id = p.id
            JOIN user_has_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Actor::new(
            user,
            parse_names::<Role>(roles, "role"),
            parse_names::<Permission>(permissions, "permission"),
        )))
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.name, u.email, u.created_at, u.updated_at
            FROM users u
            JOIN user_has_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            WHERE r.name = $1
            ORDER BY u.id
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn create_user(&self, user: NewUser, role: Role) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => HelpdeskError::InvalidArgument(format!(
                "Email already registered: {}",
                user.email
            )),
            None => HelpdeskError::Sql(e),
        })?;
        let created = user_from_row(&row)?;

        assign_role_in(&mut tx, created.id, role).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn assign_role(&self, user_id: i64, role: Role) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        assign_role_in(&mut tx, user_id, role).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn assign_role_in(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    role: Role,
) -> Result<()> {
    let role_id: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = $1")
        .bind(role.as_str())
        .fetch_optional(&mut **tx)
        .await?;
    let role_id = role_id.ok_or_else(|| {
        HelpdeskError::Config(format!(
            "Role '{}' is missing; run `helpdesk seed` first",
            role
        ))
    })?;

    sqlx::query(
        "INSERT INTO user_has_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
