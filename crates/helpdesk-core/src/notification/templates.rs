//! Notification texts for ticket and followup events.

use crate::model::{Attachment, Followup, Ticket, TicketFields, TicketPriority, TicketStatus};

use super::MailMessage;

const CLOSING: &str = "Thank you for using our application!";

/// A before/after pair for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<T> {
    pub old: T,
    pub new: T,
}

/// Field-level difference between two ticket states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketDiff {
    pub status: Option<Change<TicketStatus>>,
    pub title: Option<Change<String>>,
    /// Only whether it changed is reported.
    pub description: bool,
    pub priority: Option<Change<TicketPriority>>,
}

impl TicketDiff {
    pub fn between(before: &TicketFields, after: &TicketFields) -> Self {
        fn change<T: PartialEq + Clone>(old: &T, new: &T) -> Option<Change<T>> {
            (old != new).then(|| Change {
                old: old.clone(),
                new: new.clone(),
            })
        }

        Self {
            status: change(&before.status, &after.status),
            title: change(&before.title, &after.title),
            description: before.description != after.description,
            priority: change(&before.priority, &after.priority),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.title.is_none() && !self.description && self.priority.is_none()
    }
}

fn attachment_lines(heading: &str, files: &[Attachment]) -> Vec<String> {
    if files.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![heading.to_string()];
    lines.extend(
        files
            .iter()
            .map(|f| format!("- {} ({} KB)", f.original_filename, f.size_kb())),
    );
    lines
}

/// Sent to the owner and admins when a ticket is created.
pub fn new_ticket(
    recipient_name: &str,
    ticket: &Ticket,
    files: &[Attachment],
    url: &str,
) -> MailMessage {
    let mut msg = MailMessage::new(format!("New Ticket Created: {}", ticket.title))
        .greeting(format!("Hello, {}!", recipient_name))
        .line(format!(
            "A new ticket #{} with subject \"{}\" has been created.",
            ticket.id, ticket.title
        ))
        .line(format!("Status: {}", ticket.status))
        .line(format!("Priority: {}", ticket.priority));
    for line in attachment_lines("Files attached to the ticket:", files) {
        msg = msg.line(line);
    }
    msg.action("View Ticket", url).line(CLOSING)
}

/// Sent after an update that changed at least one tracked field.
pub fn ticket_updated(
    recipient_name: &str,
    ticket: &Ticket,
    diff: &TicketDiff,
    url: &str,
) -> MailMessage {
    let greeting = format!("Hello, {}!", recipient_name);

    let msg = if let Some(status) = &diff.status {
        MailMessage::new(format!("Ticket Status Updated: {}", ticket.title))
            .greeting(greeting)
            .line(format!(
                "The status of ticket #{} (\"{}\") has been changed.",
                ticket.id, ticket.title
            ))
            .line(format!("Old status: {}", status.old))
            .line(format!("New status: {}", status.new))
    } else {
        let mut msg = MailMessage::new(format!("Ticket Updated: {}", ticket.title))
            .greeting(greeting)
            .line(format!(
                "Ticket #{} (\"{}\") has been updated.",
                ticket.id, ticket.title
            ));
        if let Some(title) = &diff.title {
            msg = msg.line(format!("Title: {} → {}", title.old, title.new));
        }
        if diff.description {
            msg = msg.line("Description has been changed");
        }
        if let Some(priority) = &diff.priority {
            msg = msg.line(format!("Priority: {} → {}", priority.old, priority.new));
        }
        msg.line(format!("Current status: {}", ticket.status))
            .line(format!("Current priority: {}", ticket.priority))
    };

    msg.action("View Ticket", url).line(CLOSING)
}

/// Sent to the ticket owner and admins when someone replies.
pub fn new_followup(
    recipient_name: &str,
    ticket: &Ticket,
    followup: &Followup,
    author_name: &str,
    files: &[Attachment],
    url: &str,
) -> MailMessage {
    let mut msg = MailMessage::new(format!("New Reply in Ticket: {}", ticket.title))
        .greeting(format!("Hello, {}!", recipient_name))
        .line(format!(
            "{} added {} to ticket #{}:",
            author_name,
            followup.kind.article_phrase(),
            ticket.id
        ))
        .line(format!("> {}", followup.content));
    for line in attachment_lines("Files attached to the reply:", files) {
        msg = msg.line(line);
    }
    msg.action("View Ticket", url).line(CLOSING)
}
