use std::collections::HashMap;

use axum::extract::multipart::{Field, Multipart, MultipartError};
use helpdesk_core::error::HelpdeskError;
use helpdesk_core::model::UploadedFile;

use crate::lifecycle::{FollowupInput, TicketInput};

/// A decoded `multipart/form-data` body: plain fields plus every part named
/// `files`, `files[]` or `files[N]`, in submission order.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl FormData {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, HelpdeskError> {
        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if is_file_field(&name) {
                if let Some(file) = read_file(field).await? {
                    form.files.push(file);
                }
            } else {
                let value = field.text().await.map_err(bad_body)?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    pub fn ticket_input(&self) -> TicketInput {
        TicketInput {
            title: self.field("title"),
            description: self.field("description"),
            status: self.field("status"),
            priority: self.field("priority"),
        }
    }

    pub fn followup_input(&self) -> FollowupInput {
        FollowupInput {
            content: self.field("content"),
            kind: self.field("type"),
            ticket_id: self.field("ticket_id"),
        }
    }
}

fn is_file_field(name: &str) -> bool {
    name == "files"
        || name
            .strip_prefix("files[")
            .is_some_and(|rest| rest.ends_with(']'))
}

/// Browsers send an empty, nameless part when no file was picked; skip it.
/// A non-empty part without a filename is kept so validation can reject it.
async fn read_file(field: Field<'_>) -> Result<Option<UploadedFile>, HelpdeskError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(bad_body)?;

    if original_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }

    let file = UploadedFile::new(original_name, bytes.to_vec());
    Ok(Some(match content_type {
        Some(ct) => file.with_content_type(ct),
        None => file,
    }))
}

fn bad_body(e: MultipartError) -> HelpdeskError {
    HelpdeskError::InvalidArgument(format!("Malformed multipart body: {}", e.body_text()))
}
