//! Notification composition and the outbox seam.

mod message;
pub mod templates;

pub use message::{MailAction, MailMessage, OutboundMail, Recipient};
pub use templates::{Change, TicketDiff};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::User;

/// Durable queue of rendered messages awaiting delivery.
#[async_trait]
pub trait MailOutbox: Send + Sync {
    async fn enqueue(&self, mail: OutboundMail) -> Result<()>;
}

/// Build a recipient list: `primary` first (if any), then `others`, with
/// duplicates and the excluded user removed.
pub fn recipients<'a>(
    primary: Option<&'a User>,
    others: impl IntoIterator<Item = &'a User>,
    exclude: Option<i64>,
) -> Vec<Recipient> {
    let mut out: Vec<Recipient> = Vec::new();
    for user in primary.into_iter().chain(others) {
        if Some(user.id) == exclude || out.iter().any(|r| r.user_id == user.id) {
            continue;
        }
        out.push(Recipient::from(user));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64) -> User {
        User {
            id,
            name: format!("u{id}"),
            email: format!("u{id}@example.com"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_not_duplicated() {
        let owner = user(1);
        let admins = vec![user(1), user(2)];
        let ids: Vec<i64> = recipients(Some(&owner), &admins, None)
            .iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_author_excluded() {
        let owner = user(1);
        let admins = vec![user(2), user(3)];
        let ids: Vec<i64> = recipients(Some(&owner), &admins, Some(2))
            .iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);

        let ids: Vec<i64> = recipients(Some(&owner), &admins, Some(1))
            .iter()
            .map(|r| r.user_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
