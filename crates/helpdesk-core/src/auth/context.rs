use crate::error::{HelpdeskError, Result};

/// Authentication state attached to each request by the gateway.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    user_id: Option<i64>,
    roles: Vec<String>,
}

impl AuthContext {
    /// Create an unauthenticated context.
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Create an authenticated context.
    pub fn authenticated(user_id: i64, roles: Vec<String>) -> Self {
        Self {
            user_id: Some(user_id),
            roles,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Get the user ID, returning an error if not authenticated.
    pub fn require_user_id(&self) -> Result<i64> {
        self.user_id
            .ok_or_else(|| HelpdeskError::Unauthorized("Authentication required".into()))
    }

    /// Role names carried by the token.
    pub fn token_roles(&self) -> &[String] {
        &self.roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated() {
        let ctx = AuthContext::unauthenticated();
        assert!(!ctx.is_authenticated());
        assert!(matches!(
            ctx.require_user_id(),
            Err(HelpdeskError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_authenticated() {
        let ctx = AuthContext::authenticated(7, vec!["admin".into()]);
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.require_user_id().unwrap(), 7);
        assert_eq!(ctx.token_roles(), ["admin".to_string()]);
    }
}
