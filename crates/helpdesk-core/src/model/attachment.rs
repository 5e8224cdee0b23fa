use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HelpdeskError, Result};

/// Which entity type a file hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Ticket,
    Followup,
}

impl AttachmentKind {
    /// Parse a route segment. Anything but `ticket`/`followup` is a 404.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ticket" => Ok(AttachmentKind::Ticket),
            "followup" => Ok(AttachmentKind::Followup),
            _ => Err(HelpdeskError::NotFound("Unsupported file type".into())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Ticket => "ticket",
            AttachmentKind::Followup => "followup",
        }
    }

    /// Metadata table backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            AttachmentKind::Ticket => "ticket_files",
            AttachmentKind::Followup => "followup_files",
        }
    }

    /// Column holding the owning entity id.
    pub fn owner_column(&self) -> &'static str {
        match self {
            AttachmentKind::Ticket => "ticket_id",
            AttachmentKind::Followup => "followup_id",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity a file set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentOwner {
    Ticket(i64),
    Followup(i64),
}

impl AttachmentOwner {
    pub fn kind(&self) -> AttachmentKind {
        match self {
            AttachmentOwner::Ticket(_) => AttachmentKind::Ticket,
            AttachmentOwner::Followup(_) => AttachmentKind::Followup,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            AttachmentOwner::Ticket(id) | AttachmentOwner::Followup(id) => *id,
        }
    }

    /// Storage directory: `{ticket|followup}_attachments/{id}`.
    pub fn directory(&self) -> String {
        format!("{}_attachments/{}", self.kind().as_str(), self.id())
    }

    fn from_parts(kind: AttachmentKind, id: i64) -> Self {
        match kind {
            AttachmentKind::Ticket => AttachmentOwner::Ticket(id),
            AttachmentKind::Followup => AttachmentOwner::Followup(id),
        }
    }
}

impl fmt::Display for AttachmentOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind(), self.id())
    }
}

/// Metadata row for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub kind: AttachmentKind,
    pub owner_id: i64,
    /// Uploader.
    pub user_id: i64,
    pub original_filename: String,
    /// Stored name, unique across the store.
    pub filename: String,
    pub path: String,
    pub mime_type: Option<String>,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attachment {
    pub fn owner(&self) -> AttachmentOwner {
        AttachmentOwner::from_parts(self.kind, self.owner_id)
    }

    /// Size in KB rounded to two decimals.
    pub fn size_kb(&self) -> f64 {
        (self.size as f64 / 1024.0 * 100.0).round() / 100.0
    }
}

/// Input for inserting a metadata row.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub owner: AttachmentOwner,
    pub user_id: i64,
    pub original_filename: String,
    pub filename: String,
    pub path: String,
    pub mime_type: Option<String>,
    pub size: i64,
}

/// A file received from a client.
#[derive(Clone)]
pub struct UploadedFile {
    pub original_name: String,
    /// Client-declared content type.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_name: original_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Lowercased extension of the original name, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.original_name.rsplit(&['/', '\\'][..]).next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("original_name", &self.original_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Entry in a ticket's aggregated file list.
#[derive(Debug, Clone, Serialize)]
pub struct FileListing {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub is_followup: bool,
    pub followup_id: Option<i64>,
}

impl From<Attachment> for FileListing {
    fn from(attachment: Attachment) -> Self {
        let followup_id = match attachment.kind {
            AttachmentKind::Followup => Some(attachment.owner_id),
            AttachmentKind::Ticket => None,
        };
        Self {
            is_followup: followup_id.is_some(),
            followup_id,
            attachment,
        }
    }
}
