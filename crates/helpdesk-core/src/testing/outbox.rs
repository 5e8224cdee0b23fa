use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{HelpdeskError, Result};
use crate::notification::{MailOutbox, OutboundMail};

/// Outbox that records enqueued mail for later verification.
///
/// # Example
///
/// ```ignore
/// let outbox = RecordingOutbox::new();
/// service.create(&actor, input, files).await?;
///
/// outbox.assert_sent_to("admin@example.com", "New Ticket Created");
/// outbox.assert_count(2);
/// ```
pub struct RecordingOutbox {
    sent: RwLock<Vec<OutboundMail>>,
    failing: RwLock<bool>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failing: RwLock::new(false),
        }
    }

    /// Make `enqueue` fail, to exercise error paths.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write().unwrap() = failing;
    }

    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent.read().unwrap().clone()
    }

    /// Addresses in enqueue order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .read()
            .unwrap()
            .iter()
            .map(|m| m.to.email.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.write().unwrap().clear();
    }

    /// Assert a message whose subject starts with `subject_prefix` went to `email`.
    pub fn assert_sent_to(&self, email: &str, subject_prefix: &str) {
        let sent = self.sent.read().unwrap();
        let found = sent
            .iter()
            .any(|m| m.to.email == email && m.subject.starts_with(subject_prefix));
        assert!(
            found,
            "Expected '{}...' to be sent to {}, but it wasn't. Sent: {:?}",
            subject_prefix,
            email,
            sent.iter()
                .map(|m| (&m.to.email, &m.subject))
                .collect::<Vec<_>>()
        );
    }

    pub fn assert_not_sent_to(&self, email: &str) {
        let sent = self.sent.read().unwrap();
        assert!(
            !sent.iter().any(|m| m.to.email == email),
            "Expected nothing to be sent to {}, but it was",
            email
        );
    }

    pub fn assert_count(&self, expected: usize) {
        let count = self.sent.read().unwrap().len();
        assert_eq!(
            count, expected,
            "Expected {} messages, but found {}",
            expected, count
        );
    }
}

impl Default for RecordingOutbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailOutbox for RecordingOutbox {
    async fn enqueue(&self, mail: OutboundMail) -> Result<()> {
        if *self.failing.read().unwrap() {
            return Err(HelpdeskError::Mail("outbox unavailable".into()));
        }
        self.sent.write().unwrap().push(mail);
        Ok(())
    }
}
