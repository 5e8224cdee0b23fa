use serde::{Deserialize, Serialize};

use crate::error::{HelpdeskError, Result};

/// JWT claims accepted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (numeric user ID as a string).
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Display name at issue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Role names at issue time. Informational only: permissions are
    /// always reloaded from storage per request.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    /// Get the user ID.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }

    /// Check if the token names a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Create a builder for constructing claims.
    pub fn builder() -> ClaimsBuilder {
        ClaimsBuilder::new()
    }
}

/// Builder for JWT claims.
#[derive(Debug)]
pub struct ClaimsBuilder {
    sub: Option<String>,
    name: Option<String>,
    roles: Vec<String>,
    duration_secs: i64,
}

impl Default for ClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            sub: None,
            name: None,
            roles: Vec::new(),
            duration_secs: 3600,
        }
    }

    /// Set the user ID.
    pub fn user_id(mut self, id: i64) -> Self {
        self.sub = Some(id.to_string());
        self
    }

    /// Set a raw subject.
    pub fn subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Set token duration in seconds.
    pub fn duration_secs(mut self, secs: i64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Build the claims.
    pub fn build(self) -> Result<Claims> {
        let sub = self
            .sub
            .ok_or_else(|| HelpdeskError::InvalidArgument("Subject is required".into()))?;
        let now = chrono::Utc::now().timestamp();

        Ok(Claims {
            sub,
            iat: now,
            exp: now + self.duration_secs,
            name: self.name,
            roles: self.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_builder() {
        let claims = Claims::builder()
            .user_id(42)
            .name("Bea")
            .role("user")
            .duration_secs(7200)
            .build()
            .unwrap();

        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.exp - claims.iat, 7200);
        assert!(claims.has_role("user"));
        assert!(!claims.has_role("admin"));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_builder_requires_subject() {
        assert!(Claims::builder().build().is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims::builder().subject("abc").build().unwrap();
        assert_eq!(claims.user_id(), None);
    }

    #[test]
    fn test_claims_expiration() {
        let claims = Claims {
            sub: "1".to_string(),
            iat: 0,
            exp: 1,
            name: None,
            roles: vec![],
        };

        assert!(claims.is_expired());
    }
}
