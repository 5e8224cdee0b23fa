use serde::Serialize;
use tracing::info;

use helpdesk_core::auth::Actor;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::model::{
    Attachment, AttachmentOwner, Followup, FollowupType, NewFollowup, Ticket, UploadedFile,
};
use helpdesk_core::policy::{FollowupPolicy, TicketPolicy};
use helpdesk_core::repository::Repositories;
use helpdesk_core::validation::Validator;

use super::input::{FollowupFields, FollowupInput, FollowupUpdate};
use super::Notifier;
use crate::storage::{validate_files, AttachmentManager};

/// A freshly created followup and the files stored with it.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedFollowup {
    pub followup: Followup,
    pub files: Vec<Attachment>,
}

/// Followup mutations with their file cascade and notifications.
#[derive(Clone)]
pub struct FollowupService {
    repos: Repositories,
    files: AttachmentManager,
    notifier: Notifier,
}

impl FollowupService {
    pub fn new(repos: Repositories, files: AttachmentManager, notifier: Notifier) -> Self {
        Self {
            repos,
            files,
            notifier,
        }
    }

    pub async fn find(&self, id: i64) -> Result<Followup> {
        self.repos
            .followups
            .find_followup(id)
            .await?
            .ok_or_else(|| HelpdeskError::NotFound(format!("Followup {} not found", id)))
    }

    /// Reply on a ticket.
    ///
    /// Order: generic and type-specific policy, field and file validation,
    /// ticket lookup and visibility, the one-solution rule, then persist,
    /// upload and notify.
    pub async fn create(
        &self,
        actor: &Actor,
        input: FollowupInput,
        uploads: Vec<UploadedFile>,
    ) -> Result<CreatedFollowup> {
        FollowupPolicy::create(actor).authorize()?;
        if let Some(kind) = input.parsed_kind() {
            FollowupPolicy::create_of_type(actor, kind).authorize()?;
        }

        let mut v = Validator::new();
        let fields = input.check(&mut v);
        v.merge(validate_files(&uploads));
        v.finish()?;
        let fields =
            fields.ok_or_else(|| HelpdeskError::Internal("followup fields not checked".into()))?;

        let ticket = self
            .repos
            .tickets
            .find_ticket(fields.ticket_id)
            .await?
            .ok_or_else(|| {
                HelpdeskError::invalid_field("ticket_id", "The selected ticket id is invalid.")
            })?;
        TicketPolicy::view(actor, &ticket).authorize()?;

        if fields.kind == FollowupType::Solution
            && self.repos.followups.has_solution(ticket.id).await?
        {
            return Err(HelpdeskError::DuplicateSolution);
        }

        // Runs detached so a dropped request cannot stop it between the
        // insert and the notification.
        let service = self.clone();
        let actor = actor.clone();
        tokio::spawn(async move { service.persist(&actor, ticket, fields, uploads).await })
            .await
            .map_err(|e| HelpdeskError::Internal(format!("Followup creation task failed: {}", e)))?
    }

    async fn persist(
        &self,
        actor: &Actor,
        ticket: Ticket,
        fields: FollowupFields,
        uploads: Vec<UploadedFile>,
    ) -> Result<CreatedFollowup> {
        let followup = self
            .repos
            .followups
            .insert_followup(NewFollowup {
                ticket_id: ticket.id,
                user_id: actor.id(),
                kind: fields.kind,
                content: fields.content,
            })
            .await?;

        let owner = AttachmentOwner::Followup(followup.id);
        let files = match self.files.upload_files(owner, actor.id(), uploads).await {
            Ok(files) => files,
            Err(e) => {
                self.discard(&followup).await;
                return Err(e);
            }
        };

        info!(
            followup_id = followup.id,
            ticket_id = ticket.id,
            kind = %followup.kind,
            user_id = actor.id(),
            "Followup created"
        );
        self.notifier
            .followup_created(&ticket, &followup, actor.user(), &files)
            .await;

        Ok(CreatedFollowup { followup, files })
    }

    async fn discard(&self, followup: &Followup) {
        if let Err(e) = self
            .files
            .delete_files(AttachmentOwner::Followup(followup.id))
            .await
        {
            tracing::warn!(followup_id = followup.id, error = %e, "Failed to clean up uploads");
        }
        if let Err(e) = self.repos.followups.delete_followup(followup.id).await {
            tracing::error!(followup_id = followup.id, error = %e, "Failed to discard followup");
        }
    }

    /// Replace the content. Only the author may edit.
    pub async fn update(&self, actor: &Actor, id: i64, input: FollowupUpdate) -> Result<Followup> {
        let followup = self.find(id).await?;
        FollowupPolicy::update(actor, &followup).authorize()?;

        let mut v = Validator::new();
        let content = v.required("content", input.content.as_deref()).map(str::to_string);
        v.finish()?;
        let content =
            content.ok_or_else(|| HelpdeskError::Internal("followup content not checked".into()))?;

        let updated = self
            .repos
            .followups
            .update_followup_content(id, &content)
            .await?
            .ok_or_else(|| HelpdeskError::NotFound(format!("Followup {} not found", id)))?;

        info!(followup_id = id, user_id = actor.id(), "Followup updated");
        Ok(updated)
    }

    /// Remove the followup's bytes, then its row.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<Followup> {
        let followup = self.find(id).await?;
        FollowupPolicy::delete(actor, &followup).authorize()?;

        self.files
            .delete_files(AttachmentOwner::Followup(followup.id))
            .await?;
        if !self.repos.followups.delete_followup(followup.id).await? {
            return Err(HelpdeskError::NotFound(format!("Followup {} not found", id)));
        }

        info!(followup_id = id, ticket_id = followup.ticket_id, user_id = actor.id(), "Followup deleted");
        Ok(followup)
    }
}
