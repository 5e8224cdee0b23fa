use std::sync::Arc;

use helpdesk_core::auth::Role;
use helpdesk_core::config::AppConfig;
use helpdesk_core::model::{Attachment, Followup, Ticket, User};
use helpdesk_core::notification::{
    recipients, templates, MailOutbox, OutboundMail, Recipient, TicketDiff,
};
use helpdesk_core::repository::UserRepository;

/// Renders lifecycle notifications and hands them to the outbox.
///
/// Every method is fire-and-forget: lookup and enqueue failures are logged
/// and swallowed so the write that triggered them stands.
#[derive(Clone)]
pub struct Notifier {
    users: Arc<dyn UserRepository>,
    outbox: Arc<dyn MailOutbox>,
    app: AppConfig,
}

impl Notifier {
    pub fn new(users: Arc<dyn UserRepository>, outbox: Arc<dyn MailOutbox>, app: AppConfig) -> Self {
        Self { users, outbox, app }
    }

    /// Owner plus every admin, the owner listed once.
    pub async fn ticket_created(&self, ticket: &Ticket, files: &[Attachment]) {
        let url = self.app.ticket_url(ticket.id);
        let to = self.audience(ticket, None).await;
        for recipient in &to {
            let message = templates::new_ticket(&recipient.name, ticket, files, &url);
            self.enqueue(message.to_outbound(recipient), ticket.id).await;
        }
    }

    /// Nothing is sent when no tracked field changed.
    pub async fn ticket_updated(&self, ticket: &Ticket, diff: &TicketDiff) {
        if diff.is_empty() {
            return;
        }
        let url = self.app.ticket_url(ticket.id);
        let to = self.audience(ticket, None).await;
        for recipient in &to {
            let message = templates::ticket_updated(&recipient.name, ticket, diff, &url);
            self.enqueue(message.to_outbound(recipient), ticket.id).await;
        }
    }

    /// Owner and admins, minus the author.
    pub async fn followup_created(
        &self,
        ticket: &Ticket,
        followup: &Followup,
        author: &User,
        files: &[Attachment],
    ) {
        let url = self.app.ticket_url(ticket.id);
        let to = self.audience(ticket, Some(author.id)).await;
        for recipient in &to {
            let message = templates::new_followup(
                &recipient.name,
                ticket,
                followup,
                &author.name,
                files,
                &url,
            );
            self.enqueue(message.to_outbound(recipient), ticket.id).await;
        }
    }

    async fn audience(&self, ticket: &Ticket, exclude: Option<i64>) -> Vec<Recipient> {
        let owner = match self.users.find_user(ticket.user_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(ticket_id = ticket.id, error = %e, "Could not load ticket owner");
                None
            }
        };
        let admins = match self.users.users_with_role(Role::Admin).await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!(ticket_id = ticket.id, error = %e, "Could not load admins");
                Vec::new()
            }
        };
        recipients(owner.as_ref(), &admins, exclude)
    }

    async fn enqueue(&self, mail: OutboundMail, ticket_id: i64) {
        let to = mail.to.email.clone();
        match self.outbox.enqueue(mail).await {
            Ok(()) => tracing::debug!(ticket_id, to = %to, "Notification queued"),
            Err(e) => tracing::warn!(ticket_id, to = %to, error = %e, "Failed to queue notification"),
        }
    }
}
