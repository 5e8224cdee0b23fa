use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};

use helpdesk_core::error::Result;
use helpdesk_core::filter::{escape_like, PageRequest, TicketQuery, Visibility};
use helpdesk_core::model::{NewTicket, Ticket, TicketFields, TicketWithOwner};
use helpdesk_core::repository::TicketRepository;

use super::PgStore;

const TICKET_COLUMNS: &str = "tickets.id, tickets.user_id, tickets.title, tickets.description, \
     tickets.status, tickets.priority, tickets.created_at, tickets.updated_at";

pub(crate) fn ticket_from_row(row: &PgRow) -> Result<Ticket> {
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    Ok(Ticket {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: status.parse()?,
        priority: priority.parse()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Append the visibility scope and filters as a `WHERE` clause.
fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, query: &TicketQuery) {
    qb.push(" WHERE TRUE");

    if let Visibility::OwnedBy(user_id) = query.visibility {
        qb.push(" AND tickets.user_id = ").push_bind(user_id);
    }

    let f = &query.filters;
    if let Some(prefix) = &f.id {
        qb.push(" AND CAST(tickets.id AS TEXT) LIKE ")
            .push_bind(format!("{}%", escape_like(prefix)))
            .push(r" ESCAPE '\'");
    }
    if let Some(title) = &f.title {
        qb.push(" AND tickets.title ILIKE ")
            .push_bind(format!("%{}%", escape_like(title)))
            .push(r" ESCAPE '\'");
    }
    if let Some(description) = &f.description {
        qb.push(" AND tickets.description ILIKE ")
            .push_bind(format!("%{}%", escape_like(description)))
            .push(r" ESCAPE '\'");
    }
    if let Some(status) = &f.status {
        qb.push(" AND tickets.status = ").push_bind(status.clone());
    }
    if let Some(priority) = &f.priority {
        qb.push(" AND tickets.priority = ").push_bind(priority.clone());
    }
    if let Some(name) = &f.user_name {
        qb.push(" AND users.name ILIKE ")
            .push_bind(format!("%{}%", escape_like(name)))
            .push(r" ESCAPE '\'");
    }
}

/// The listing statement, without bound values.
fn select_sql(query: &TicketQuery, page: Option<PageRequest>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {}, users.name AS user_name FROM tickets JOIN users ON users.id = tickets.user_id",
        TICKET_COLUMNS
    ));
    push_conditions(&mut qb, query);

    let dir = query.sort.order.as_sql();
    qb.push(format!(
        " ORDER BY {} {}, tickets.id {}",
        query.sort.field.column(),
        dir,
        dir
    ));

    if let Some(page) = page {
        qb.push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);
    }
    qb
}

fn count_sql(query: &TicketQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM tickets JOIN users ON users.id = tickets.user_id",
    );
    push_conditions(&mut qb, query);
    qb
}

#[async_trait]
impl TicketRepository for PgStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tickets (user_id, title, description, status, priority)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(ticket.user_id)
        .bind(&ticket.fields.title)
        .bind(&ticket.fields.description)
        .bind(ticket.fields.status.as_str())
        .bind(ticket.fields.priority.as_str())
        .fetch_one(&self.pool)
        .await?;

        ticket_from_row(&row)
    }

    async fn find_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tickets WHERE tickets.id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn update_ticket(&self, id: i64, fields: &TicketFields) -> Result<Option<Ticket>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE tickets
            SET title = $2, description = $3, status = $4, priority = $5, updated_at = NOW()
            WHERE tickets.id = $1
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.description)
        .bind(fields.status.as_str())
        .bind(fields.priority.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn delete_ticket(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_tickets(
        &self,
        query: &TicketQuery,
        page: Option<PageRequest>,
    ) -> Result<(Vec<TicketWithOwner>, u64)> {
        let rows = select_sql(query, page).build().fetch_all(&self.pool).await?;

        let tickets = rows
            .iter()
            .map(|row| {
                Ok(TicketWithOwner {
                    ticket: ticket_from_row(row)?,
                    user_name: row.try_get("user_name")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total = match page {
            Some(_) => {
                let count: i64 = count_sql(query)
                    .build_query_scalar()
                    .fetch_one(&self.pool)
                    .await?;
                count as u64
            }
            None => tickets.len() as u64,
        };

        Ok((tickets, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use helpdesk_core::auth::{Actor, Role};
    use helpdesk_core::filter::{SortField, SortOrder, TicketFilters, TicketSort};
    use helpdesk_core::model::User;

    fn actor(role: Role) -> Actor {
        let now = Utc::now();
        Actor::from_roles(
            User {
                id: 7,
                name: "u".into(),
                email: "u@example.com".into(),
                created_at: now,
                updated_at: now,
            },
            [role],
        )
    }

    #[test]
    fn test_owner_scope_and_filters() {
        let filters = TicketFilters {
            id: Some("12".into()),
            title: Some("50%".into()),
            status: Some("open".into()),
            user_name: Some("bob".into()),
            ..Default::default()
        };
        let query = TicketQuery::for_actor(&actor(Role::User), filters, TicketSort::default());
        let sql = select_sql(&query, Some(PageRequest::default())).into_sql();

        assert!(sql.contains("tickets.user_id = $1"));
        assert!(sql.contains("CAST(tickets.id AS TEXT) LIKE $2 ESCAPE '\\'"));
        assert!(sql.contains("tickets.title ILIKE $3"));
        assert!(sql.contains("tickets.status = $4"));
        // dropped for non-admins
        assert!(!sql.contains("users.name ILIKE"));
        assert!(sql.ends_with("ORDER BY tickets.updated_at DESC, tickets.id DESC LIMIT $5 OFFSET $6"));
    }

    #[test]
    fn test_admin_sort_by_owner_name() {
        let filters = TicketFilters {
            user_name: Some("bob".into()),
            ..Default::default()
        };
        let sort = TicketSort {
            field: SortField::UserName,
            order: SortOrder::Asc,
        };
        let query = TicketQuery::for_actor(&actor(Role::Admin), filters, sort);
        let sql = select_sql(&query, None).into_sql();

        assert!(!sql.contains("tickets.user_id = "));
        assert!(sql.contains("users.name ILIKE $1"));
        assert!(sql.ends_with("ORDER BY users.name ASC, tickets.id ASC"));

        let count = count_sql(&query).into_sql();
        assert!(count.starts_with("SELECT COUNT(*)"));
        assert!(!count.contains("ORDER BY"));
    }
}
