use serde::{Deserialize, Serialize};

/// How notifications leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    Smtp,
    /// Write messages to the log instead of sending them.
    Log,
}

/// Outgoing mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_transport")]
    pub transport: MailTransport,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    /// Upper bound for a single delivery attempt.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            from_address: default_from_address(),
            from_name: default_from_name(),
            timeout_secs: default_timeout(),
        }
    }
}

impl MailConfig {
    /// `Name <address>` mailbox string.
    pub fn from_mailbox(&self) -> String {
        if self.from_name.is_empty() {
            self.from_address.clone()
        } else {
            format!("{} <{}>", self.from_name, self.from_address)
        }
    }
}

fn default_transport() -> MailTransport {
    MailTransport::Log
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "helpdesk@example.com".to_string()
}

fn default_from_name() -> String {
    "Helpdesk".to_string()
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport_is_log() {
        let config = MailConfig::default();
        assert_eq!(config.transport, MailTransport::Log);
        assert_eq!(config.from_mailbox(), "Helpdesk <helpdesk@example.com>");
    }

    #[test]
    fn test_parse_smtp() {
        let toml = r#"
            transport = "smtp"
            host = "smtp.example.com"
            port = 465
            username = "bot"
            password = "secret"
            from_name = ""
        "#;
        let config: MailConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.transport, MailTransport::Smtp);
        assert_eq!(config.port, 465);
        assert_eq!(config.username.as_deref(), Some("bot"));
        assert_eq!(config.from_mailbox(), "helpdesk@example.com");
    }
}
