use serde::Serialize;
use tracing::info;

use helpdesk_core::auth::Actor;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::model::{
    Attachment, AttachmentOwner, FollowupDetail, NewTicket, Ticket, TicketDetail, TicketFields,
    UploadedFile,
};
use helpdesk_core::notification::TicketDiff;
use helpdesk_core::policy::TicketPolicy;
use helpdesk_core::repository::Repositories;
use helpdesk_core::validation::ValidationErrors;

use super::input::TicketInput;
use super::Notifier;
use crate::storage::{validate_files, AttachmentManager};

/// A freshly created ticket and the files stored with it.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTicket {
    pub ticket: Ticket,
    pub files: Vec<Attachment>,
}

/// Ticket mutations with their file cascade and notifications.
#[derive(Clone)]
pub struct TicketService {
    repos: Repositories,
    files: AttachmentManager,
    notifier: Notifier,
}

impl TicketService {
    pub fn new(repos: Repositories, files: AttachmentManager, notifier: Notifier) -> Self {
        Self {
            repos,
            files,
            notifier,
        }
    }

    /// Load a ticket or fail with `NotFound`.
    pub async fn find(&self, id: i64) -> Result<Ticket> {
        self.repos
            .tickets
            .find_ticket(id)
            .await?
            .ok_or_else(|| HelpdeskError::NotFound(format!("Ticket {} not found", id)))
    }

    pub async fn create(
        &self,
        actor: &Actor,
        input: TicketInput,
        uploads: Vec<UploadedFile>,
    ) -> Result<CreatedTicket> {
        TicketPolicy::create(actor).authorize()?;

        let fields = input.validate_with(validate_files(&uploads))?;

        // Runs detached so a dropped request cannot stop it between the
        // insert and the notification.
        let service = self.clone();
        let actor = actor.clone();
        tokio::spawn(async move { service.persist(&actor, fields, uploads).await })
            .await
            .map_err(|e| HelpdeskError::Internal(format!("Ticket creation task failed: {}", e)))?
    }

    async fn persist(
        &self,
        actor: &Actor,
        fields: TicketFields,
        uploads: Vec<UploadedFile>,
    ) -> Result<CreatedTicket> {
        let ticket = self
            .repos
            .tickets
            .insert_ticket(NewTicket {
                user_id: actor.id(),
                fields,
            })
            .await?;

        let owner = AttachmentOwner::Ticket(ticket.id);
        let files = match self.files.upload_files(owner, actor.id(), uploads).await {
            Ok(files) => files,
            Err(e) => {
                self.discard(&ticket).await;
                return Err(e);
            }
        };

        info!(ticket_id = ticket.id, user_id = actor.id(), files = files.len(), "Ticket created");
        self.notifier.ticket_created(&ticket, &files).await;

        Ok(CreatedTicket { ticket, files })
    }

    /// Roll back a ticket whose uploads failed part way.
    async fn discard(&self, ticket: &Ticket) {
        if let Err(e) = self.files.delete_files(AttachmentOwner::Ticket(ticket.id)).await {
            tracing::warn!(ticket_id = ticket.id, error = %e, "Failed to clean up uploads");
        }
        if let Err(e) = self.repos.tickets.delete_ticket(ticket.id).await {
            tracing::error!(ticket_id = ticket.id, error = %e, "Failed to discard ticket");
        }
    }

    /// The ticket with owner, followups (oldest first) and every file.
    pub async fn show(&self, actor: &Actor, id: i64) -> Result<TicketDetail> {
        let ticket = self.find(id).await?;
        TicketPolicy::view(actor, &ticket).authorize()?;

        let owner = self
            .repos
            .users
            .find_user(ticket.user_id)
            .await?
            .ok_or_else(|| HelpdeskError::NotFound(format!("User {} not found", ticket.user_id)))?;

        let files = self
            .repos
            .attachments
            .attachments_for(AttachmentOwner::Ticket(ticket.id))
            .await?;

        let mut followups = Vec::new();
        for followup in self.repos.followups.followups_for_ticket(ticket.id).await? {
            let user = self
                .repos
                .users
                .find_user(followup.user_id)
                .await?
                .map(|u| u.summary());
            let files = self
                .repos
                .attachments
                .attachments_for(AttachmentOwner::Followup(followup.id))
                .await?;
            followups.push(FollowupDetail {
                followup,
                user,
                files,
            });
        }

        let all_files = self.files.ticket_files(ticket.id).await?;

        Ok(TicketDetail {
            ticket,
            user: owner.summary(),
            files,
            followups,
            all_files,
        })
    }

    /// Overwrite the editable fields and report what changed.
    pub async fn update(&self, actor: &Actor, id: i64, input: TicketInput) -> Result<Ticket> {
        let before = self.find(id).await?;
        TicketPolicy::update(actor, &before).authorize()?;

        let fields = input.validate_with(ValidationErrors::new())?;

        let after = self
            .repos
            .tickets
            .update_ticket(id, &fields)
            .await?
            .ok_or_else(|| HelpdeskError::NotFound(format!("Ticket {} not found", id)))?;

        let diff = TicketDiff::between(&before.fields(), &after.fields());
        info!(ticket_id = id, user_id = actor.id(), changed = !diff.is_empty(), "Ticket updated");
        self.notifier.ticket_updated(&after, &diff).await;

        Ok(after)
    }

    /// Attach more files to an existing ticket.
    pub async fn attach_files(
        &self,
        actor: &Actor,
        id: i64,
        uploads: Vec<UploadedFile>,
    ) -> Result<Vec<Attachment>> {
        let ticket = self.find(id).await?;
        TicketPolicy::update(actor, &ticket).authorize()?;
        self.files
            .validate_and_upload(AttachmentOwner::Ticket(ticket.id), actor.id(), uploads)
            .await
    }

    /// Remove the ticket aggregate: followup bytes, ticket bytes, then the
    /// row (metadata and followups go by cascade).
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let ticket = self.find(id).await?;
        TicketPolicy::delete(actor, &ticket).authorize()?;

        for followup in self.repos.followups.followups_for_ticket(ticket.id).await? {
            self.files
                .delete_files(AttachmentOwner::Followup(followup.id))
                .await?;
        }
        self.files
            .delete_files(AttachmentOwner::Ticket(ticket.id))
            .await?;

        if !self.repos.tickets.delete_ticket(ticket.id).await? {
            return Err(HelpdeskError::NotFound(format!("Ticket {} not found", id)));
        }
        info!(ticket_id = id, user_id = actor.id(), "Ticket deleted");
        Ok(())
    }
}
