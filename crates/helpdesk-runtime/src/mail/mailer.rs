use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use helpdesk_core::config::{MailConfig, MailTransport};
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::notification::OutboundMail;

/// Final delivery of a rendered message.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundMail) -> Result<()>;
}

/// Build the configured mailer.
pub fn mailer_from_config(config: &MailConfig) -> Result<Box<dyn Mailer>> {
    Ok(match config.transport {
        MailTransport::Smtp => Box::new(SmtpMailer::from_config(config)?),
        MailTransport::Log => Box::new(LogMailer),
    })
}

/// SMTP delivery through lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS, localhost is plaintext, anything else
    /// negotiates STARTTLS.
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = config
            .from_mailbox()
            .parse()
            .map_err(|e| HelpdeskError::Config(format!("Invalid mail.from_address: {}", e)))?;

        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| HelpdeskError::Config(format!("SMTP relay error: {}", e)))?
        } else if config.host == "localhost" || config.host == "127.0.0.1" {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| HelpdeskError::Config(format!("SMTP relay error: {}", e)))?
        };

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, mail: &OutboundMail) -> Result<Message> {
        let address: Address = mail.to.email.parse().map_err(|e| {
            HelpdeskError::Mail(format!("Invalid recipient {}: {}", mail.to.email, e))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(mail.to.name.clone()), address))
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| HelpdeskError::Mail(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        let message = self.build_message(mail)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| HelpdeskError::Mail(format!("Failed to send email: {}", e)))?;
        tracing::debug!(to = %mail.to.email, subject = %mail.subject, "Email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutboundMail) -> Result<()> {
        tracing::info!(to = %mail.to.email, subject = %mail.subject, "Mail (log transport)");
        tracing::debug!(body = %mail.body, "Mail body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::notification::Recipient;

    fn mail(email: &str) -> OutboundMail {
        OutboundMail {
            to: Recipient {
                user_id: 1,
                name: "Ann".into(),
                email: email.into(),
            },
            subject: "New Ticket Created: VPN".into(),
            body: "Hello, Ann!\n".into(),
        }
    }

    #[tokio::test]
    async fn test_build_message() {
        let config = MailConfig {
            transport: MailTransport::Smtp,
            ..Default::default()
        };
        let mailer = SmtpMailer::from_config(&config).unwrap();
        let message = mailer.build_message(&mail("ann@example.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: New Ticket Created: VPN"));
        assert!(raw.contains("ann@example.com"));
        assert!(raw.contains("helpdesk@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_mail_error() {
        let mailer = SmtpMailer::from_config(&MailConfig::default()).unwrap();
        assert!(matches!(
            mailer.build_message(&mail("not an address")),
            Err(HelpdeskError::Mail(_))
        ));
    }

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        assert!(LogMailer.send(&mail("whoever@example.com")).await.is_ok());
    }
}
