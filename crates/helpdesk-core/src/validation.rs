//! Field validation with per-field error messages.
//!
//! Messages follow the wording users of the web UI already know, e.g.
//! `The title field is required.` Field names are rendered with
//! underscores replaced by spaces.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Result;

/// Field-keyed validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// First message recorded for a field.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Merge another set of messages into this one.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(())` when no messages were recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into())
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.errors.values().flatten().next();
        match (first, self.errors.values().map(Vec::len).sum::<usize>()) {
            (None, _) => write!(f, "The given data was invalid."),
            (Some(message), 1) => write!(f, "{}", message),
            (Some(message), total) => write!(
                f,
                "{} (and {} more error{})",
                message,
                total - 1,
                if total == 2 { "" } else { "s" }
            ),
        }
    }
}

/// Render a field name the way messages show it.
pub fn attribute(field: &str) -> String {
    field.replace('_', " ")
}

/// Accumulating validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A present, non-blank string. Returns the value when it passes.
    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                self.errors.add(
                    field,
                    format!("The {} field is required.", attribute(field)),
                );
                None
            }
        }
    }

    /// At most `max` characters.
    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) -> bool {
        if value.chars().count() > max {
            self.errors.add(
                field,
                format!(
                    "The {} field must not be greater than {} characters.",
                    attribute(field),
                    max
                ),
            );
            false
        } else {
            true
        }
    }

    /// One of the values accepted by `T::from_str`.
    pub fn one_of<T: FromStr>(&mut self, field: &str, value: &str) -> Option<T> {
        match value.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                self.invalid_selection(field);
                None
            }
        }
    }

    /// Record the generic "selected value is invalid" message.
    pub fn invalid_selection(&mut self, field: &str) {
        self.errors.add(
            field,
            format!("The selected {} is invalid.", attribute(field)),
        );
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.merge(other);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> Result<()> {
        self.errors.into_result()
    }

    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HelpdeskError;
    use crate::model::TicketStatus;

    #[test]
    fn test_required_rejects_blank() {
        let mut v = Validator::new();
        assert_eq!(v.required("title", Some("   ")), None);
        assert_eq!(v.required("description", None), None);
        assert_eq!(v.required("content", Some("hi")), Some("hi"));

        let errors = v.into_errors();
        assert_eq!(errors.first("title"), Some("The title field is required."));
        assert!(errors.contains("description"));
        assert!(!errors.contains("content"));
    }

    #[test]
    fn test_attribute_rendering() {
        let mut v = Validator::new();
        v.required("ticket_id", None);
        assert_eq!(
            v.into_errors().first("ticket_id"),
            Some("The ticket id field is required.")
        );
    }

    #[test]
    fn test_max_chars_counts_characters() {
        let mut v = Validator::new();
        assert!(v.max_chars("title", &"é".repeat(255), 255));
        assert!(!v.max_chars("title", &"a".repeat(256), 255));
        assert_eq!(
            v.into_errors().first("title"),
            Some("The title field must not be greater than 255 characters.")
        );
    }

    #[test]
    fn test_one_of() {
        let mut v = Validator::new();
        assert_eq!(
            v.one_of::<TicketStatus>("status", "in_progress"),
            Some(TicketStatus::InProgress)
        );
        assert_eq!(v.one_of::<TicketStatus>("status", "reopened"), None);
        assert_eq!(
            v.into_errors().first("status"),
            Some("The selected status is invalid.")
        );
    }

    #[test]
    fn test_finish() {
        assert!(Validator::new().finish().is_ok());

        let mut v = Validator::new();
        v.add("files.0", "bad");
        match v.finish() {
            Err(HelpdeskError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_display_summarizes() {
        let mut errors = ValidationErrors::new();
        errors.add("content", "The content field is required.");
        assert_eq!(errors.to_string(), "The content field is required.");

        errors.add("type", "The type field is required.");
        assert_eq!(
            errors.to_string(),
            "The content field is required. (and 1 more error)"
        );
    }
}
