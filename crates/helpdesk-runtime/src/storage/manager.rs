//! Attachment lifecycle: validation, storage, authorized download and removal.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use helpdesk_core::auth::Actor;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::model::{
    Attachment, AttachmentKind, AttachmentOwner, FileListing, Followup, NewAttachment, Ticket,
    UploadedFile,
};
use helpdesk_core::policy::{FollowupPolicy, TicketPolicy};
use helpdesk_core::repository::Repositories;
use helpdesk_core::validation::ValidationErrors;

use super::StorageBackend;

/// Accepted upload extensions, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 9] =
    ["jpg", "jpeg", "png", "pdf", "doc", "docx", "zip", "rar", "txt"];

/// Per-file size limit in KiB.
pub const MAX_FILE_KB: usize = 10240;

/// A stored file together with the ticket that governs access to it.
#[derive(Debug, Clone)]
pub struct FileLocation {
    pub attachment: Attachment,
    pub ticket: Ticket,
    /// Set for followup files.
    pub followup: Option<Followup>,
}

/// Outcome of a download request.
#[derive(Debug)]
pub enum Download {
    File {
        bytes: Vec<u8>,
        filename: String,
        mime_type: String,
    },
    /// Metadata exists but the bytes are gone.
    Missing { ticket_id: i64 },
}

/// Check an upload list. Errors are keyed `files.N`.
pub fn validate_files(files: &[UploadedFile]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (i, file) in files.iter().enumerate() {
        let field = format!("files.{}", i);
        if file.original_name.trim().is_empty() {
            errors.add(&field, format!("The {} field must be a file.", field));
            continue;
        }
        let allowed = file
            .extension()
            .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));
        if !allowed {
            errors.add(
                &field,
                format!(
                    "The {} field must be a file of type: {}.",
                    field,
                    ALLOWED_EXTENSIONS.join(", ")
                ),
            );
        }
        if file.size() > MAX_FILE_KB * 1024 {
            errors.add(
                &field,
                format!(
                    "The {} field must not be greater than {} kilobytes.",
                    field, MAX_FILE_KB
                ),
            );
        }
    }
    errors
}

/// Stored name: random token plus the lowercased original extension.
fn stored_name(file: &UploadedFile) -> String {
    let token = Uuid::new_v4().simple().to_string();
    match file.extension() {
        Some(ext) => format!("{}.{}", token, ext),
        None => token,
    }
}

fn mime_type_of(file: &UploadedFile) -> Option<String> {
    file.content_type
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| {
            mime_guess::from_path(&file.original_name)
                .first()
                .map(|m| m.to_string())
        })
}

/// Owns the physical files and their metadata rows.
#[derive(Clone)]
pub struct AttachmentManager {
    backend: Arc<dyn StorageBackend>,
    repos: Repositories,
}

impl AttachmentManager {
    pub fn new(backend: Arc<dyn StorageBackend>, repos: Repositories) -> Self {
        Self { backend, repos }
    }

    /// Fail with `Validation` if any file is unacceptable.
    pub fn validate(&self, files: &[UploadedFile]) -> Result<()> {
        validate_files(files).into_result()
    }

    /// Store each file under the owner's directory and record it.
    pub async fn upload_files(
        &self,
        owner: AttachmentOwner,
        uploader: i64,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<Attachment>> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let filename = stored_name(&file);
            let path = format!("{}/{}", owner.directory(), filename);

            self.backend.write(&path, &file.bytes).await?;

            let attachment = self
                .repos
                .attachments
                .insert_attachment(NewAttachment {
                    owner,
                    user_id: uploader,
                    mime_type: mime_type_of(&file),
                    size: file.size() as i64,
                    original_filename: file.original_name,
                    filename,
                    path: path.clone(),
                })
                .await;

            match attachment {
                Ok(attachment) => stored.push(attachment),
                Err(e) => {
                    if let Err(cleanup) = self.backend.delete(&path).await {
                        warn!(path = %path, error = %cleanup, "Failed to remove orphaned upload");
                    }
                    return Err(e);
                }
            }
        }

        if !stored.is_empty() {
            info!(owner = %owner, count = stored.len(), "Stored attachments");
        }
        Ok(stored)
    }

    /// Validate the whole list, then upload; nothing is written on failure.
    pub async fn validate_and_upload(
        &self,
        owner: AttachmentOwner,
        uploader: i64,
        files: Vec<UploadedFile>,
    ) -> Result<Vec<Attachment>> {
        self.validate(&files)?;
        self.upload_files(owner, uploader, files).await
    }

    /// Resolve a file and the ticket it belongs to.
    pub async fn find_file(&self, kind: AttachmentKind, file_id: i64) -> Result<FileLocation> {
        let not_found = || HelpdeskError::NotFound(format!("File {} not found", file_id));

        let attachment = self
            .repos
            .attachments
            .find_attachment(kind, file_id)
            .await?
            .ok_or_else(not_found)?;

        let (ticket_id, followup) = match kind {
            AttachmentKind::Ticket => (attachment.owner_id, None),
            AttachmentKind::Followup => {
                let followup = self
                    .repos
                    .followups
                    .find_followup(attachment.owner_id)
                    .await?
                    .ok_or_else(not_found)?;
                (followup.ticket_id, Some(followup))
            }
        };

        let ticket = self
            .repos
            .tickets
            .find_ticket(ticket_id)
            .await?
            .ok_or_else(not_found)?;

        Ok(FileLocation {
            attachment,
            ticket,
            followup,
        })
    }

    /// Authorize against the owning ticket, then return the bytes.
    pub async fn download_with_authorization(
        &self,
        actor: &Actor,
        kind: AttachmentKind,
        file_id: i64,
    ) -> Result<Download> {
        let location = self.find_file(kind, file_id).await?;
        TicketPolicy::view(actor, &location.ticket).authorize()?;

        let attachment = location.attachment;
        if !self.backend.exists(&attachment.path).await? {
            warn!(
                file_id = attachment.id,
                kind = %kind,
                path = %attachment.path,
                "Attachment metadata exists but the file is missing"
            );
            return Ok(Download::Missing {
                ticket_id: location.ticket.id,
            });
        }

        let bytes = self.backend.read(&attachment.path).await?;
        let mime_type = attachment
            .mime_type
            .clone()
            .or_else(|| {
                mime_guess::from_path(&attachment.original_filename)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        debug!(file_id = attachment.id, kind = %kind, size = bytes.len(), "Serving attachment");
        Ok(Download::File {
            bytes,
            filename: attachment.original_filename,
            mime_type,
        })
    }

    /// Remove every physical file of `owner` and its directory.
    ///
    /// Best-effort: individual failures are logged. Metadata rows are left
    /// to the owner's cascade.
    pub async fn delete_files(&self, owner: AttachmentOwner) -> Result<()> {
        let attachments = self.repos.attachments.attachments_for(owner).await?;
        for attachment in &attachments {
            if let Err(e) = self.backend.delete(&attachment.path).await {
                warn!(owner = %owner, path = %attachment.path, error = %e, "Failed to delete file");
            }
        }
        if let Err(e) = self.backend.delete_dir(&owner.directory()).await {
            warn!(owner = %owner, error = %e, "Failed to delete attachment directory");
        }
        debug!(owner = %owner, count = attachments.len(), "Deleted attachment files");
        Ok(())
    }

    /// Remove one file. Needs update rights on the owning ticket or followup.
    pub async fn delete_file(
        &self,
        actor: &Actor,
        kind: AttachmentKind,
        file_id: i64,
    ) -> Result<Attachment> {
        let location = self.find_file(kind, file_id).await?;
        match &location.followup {
            Some(followup) => FollowupPolicy::update(actor, followup),
            None => TicketPolicy::update(actor, &location.ticket),
        }
        .authorize()?;

        let attachment = location.attachment;
        self.backend.delete(&attachment.path).await?;
        self.repos
            .attachments
            .delete_attachment(attachment.kind, attachment.id)
            .await?;

        info!(file_id = attachment.id, kind = %kind, user_id = actor.id(), "Attachment deleted");
        Ok(attachment)
    }

    /// A ticket's own files plus its followups' files, newest first.
    pub async fn ticket_files(&self, ticket_id: i64) -> Result<Vec<FileListing>> {
        let mut all = self
            .repos
            .attachments
            .attachments_for(AttachmentOwner::Ticket(ticket_id))
            .await?;

        for followup in self.repos.followups.followups_for_ticket(ticket_id).await? {
            all.extend(
                self.repos
                    .attachments
                    .attachments_for(AttachmentOwner::Followup(followup.id))
                    .await?,
            );
        }

        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(all.into_iter().map(FileListing::from).collect())
    }
}
