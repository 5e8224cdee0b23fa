use serde::{Deserialize, Serialize};

/// A notification addressee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

impl From<&crate::model::User> for Recipient {
    fn from(user: &crate::model::User) -> Self {
        Self {
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Button-style link at the end of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAction {
    pub text: String,
    pub url: String,
}

/// Structured mail content before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub greeting: String,
    pub lines: Vec<String>,
    pub action: Option<MailAction>,
    pub outro: Vec<String>,
}

impl MailMessage {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            greeting: String::new(),
            lines: Vec::new(),
            action: None,
            outro: Vec::new(),
        }
    }

    pub fn greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Lines before the action go to the body, lines after it to the outro.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        if self.action.is_some() {
            self.outro.push(line.into());
        } else {
            self.lines.push(line.into());
        }
        self
    }

    pub fn action(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.action = Some(MailAction {
            text: text.into(),
            url: url.into(),
        });
        self
    }

    /// Plain-text body.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if !self.greeting.is_empty() {
            out.push_str(&self.greeting);
            out.push_str("\n\n");
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        if let Some(action) = &self.action {
            out.push('\n');
            out.push_str(&format!("{}: {}\n", action.text, action.url));
        }
        if !self.outro.is_empty() {
            out.push('\n');
            for line in &self.outro {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }

    pub fn to_outbound(&self, to: &Recipient) -> OutboundMail {
        OutboundMail {
            to: to.clone(),
            subject: self.subject.clone(),
            body: self.render_text(),
        }
    }
}

/// A rendered message ready for the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMail {
    pub to: Recipient,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_after_action_are_outro() {
        let msg = MailMessage::new("Hi")
            .greeting("Hello, Ann!")
            .line("body")
            .action("View Ticket", "http://x/tickets/1")
            .line("bye");
        assert_eq!(msg.lines, vec!["body"]);
        assert_eq!(msg.outro, vec!["bye"]);
        assert_eq!(
            msg.render_text(),
            "Hello, Ann!\n\nbody\n\nView Ticket: http://x/tickets/1\n\nbye\n"
        );
    }
}
