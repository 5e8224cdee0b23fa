use serde::Deserialize;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::model::{FollowupType, TicketFields, TicketPriority, TicketStatus};
use helpdesk_core::validation::{ValidationErrors, Validator};

/// Longest accepted ticket title.
pub const MAX_TITLE_CHARS: usize = 255;

/// Raw ticket fields as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
}

impl TicketInput {
    /// Check every field, recording failures on `v`. Returns the parsed
    /// fields only when all of them passed.
    pub fn check(&self, v: &mut Validator) -> Option<TicketFields> {
        let title = v.required("title", self.title.as_deref());
        let title = title.filter(|t| v.max_chars("title", t, MAX_TITLE_CHARS));
        let description = v.required("description", self.description.as_deref());
        let status = v
            .required("status", self.status.as_deref())
            .and_then(|s| v.one_of::<TicketStatus>("status", s));
        let priority = v
            .required("priority", self.priority.as_deref())
            .and_then(|p| v.one_of::<TicketPriority>("priority", p));

        Some(TicketFields {
            title: title?.to_string(),
            description: description?.to_string(),
            status: status?,
            priority: priority?,
        })
    }

    /// Validate together with `extra` errors (file checks) so the caller sees
    /// every failure at once.
    pub fn validate_with(&self, extra: ValidationErrors) -> Result<TicketFields> {
        let mut v = Validator::new();
        let fields = self.check(&mut v);
        v.merge(extra);
        v.finish()?;
        fields.ok_or_else(|| HelpdeskError::Internal("ticket fields not checked".into()))
    }
}

/// Raw followup fields as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowupInput {
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub ticket_id: Option<String>,
}

/// Checked followup fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowupFields {
    pub content: String,
    pub kind: FollowupType,
    pub ticket_id: i64,
}

impl FollowupInput {
    /// The type, if it names a known one. Used for the type-specific
    /// policy check ahead of full validation.
    pub fn parsed_kind(&self) -> Option<FollowupType> {
        self.kind.as_deref().and_then(|k| k.parse().ok())
    }

    pub fn check(&self, v: &mut Validator) -> Option<FollowupFields> {
        let content = v.required("content", self.content.as_deref());
        let kind = v
            .required("type", self.kind.as_deref())
            .and_then(|k| v.one_of::<FollowupType>("type", k));
        let ticket_id = v
            .required("ticket_id", self.ticket_id.as_deref())
            .and_then(|id| match id.trim().parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    v.add("ticket_id", "The ticket id field must be an integer.");
                    None
                }
            });

        Some(FollowupFields {
            content: content?.to_string(),
            kind: kind?,
            ticket_id: ticket_id?,
        })
    }
}

/// Body of a followup edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowupUpdate {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_input() -> TicketInput {
        TicketInput {
            title: Some("Printer broken".into()),
            description: Some("Paper jam on floor 2".into()),
            status: Some("open".into()),
            priority: Some("medium".into()),
        }
    }

    #[test]
    fn test_valid_ticket_input() {
        let mut v = Validator::new();
        let fields = ticket_input().check(&mut v).unwrap();
        assert!(!v.has_errors());
        assert_eq!(fields.status, TicketStatus::Open);
        assert_eq!(fields.priority, TicketPriority::Medium);
    }

    #[test]
    fn test_ticket_input_collects_every_error() {
        let input = TicketInput {
            title: Some("x".repeat(MAX_TITLE_CHARS + 1)),
            description: None,
            status: Some("pending".into()),
            priority: Some("".into()),
        };
        let mut v = Validator::new();
        assert!(input.check(&mut v).is_none());

        let errors = v.into_errors();
        assert_eq!(
            errors.first("title"),
            Some("The title field must not be greater than 255 characters.")
        );
        assert_eq!(
            errors.first("description"),
            Some("The description field is required.")
        );
        assert_eq!(errors.first("status"), Some("The selected status is invalid."));
        assert_eq!(errors.first("priority"), Some("The priority field is required."));
    }

    #[test]
    fn test_title_length_counts_characters() {
        let mut input = ticket_input();
        input.title = Some("é".repeat(MAX_TITLE_CHARS));
        let mut v = Validator::new();
        assert!(input.check(&mut v).is_some());
    }

    #[test]
    fn test_followup_input() {
        let input = FollowupInput {
            content: Some("Rebooted the router".into()),
            kind: Some("solution".into()),
            ticket_id: Some("12".into()),
        };
        let mut v = Validator::new();
        let fields = input.check(&mut v).unwrap();
        assert_eq!(fields.kind, FollowupType::Solution);
        assert_eq!(fields.ticket_id, 12);
        assert_eq!(input.parsed_kind(), Some(FollowupType::Solution));
    }

    #[test]
    fn test_followup_input_errors() {
        let input = FollowupInput {
            content: Some(" ".into()),
            kind: Some("answer".into()),
            ticket_id: Some("twelve".into()),
        };
        let mut v = Validator::new();
        assert!(input.check(&mut v).is_none());
        assert_eq!(input.parsed_kind(), None);

        let errors = v.into_errors();
        assert!(errors.contains("content"));
        assert_eq!(errors.first("type"), Some("The selected type is invalid."));
        assert_eq!(
            errors.first("ticket_id"),
            Some("The ticket id field must be an integer.")
        );
    }
}
