//! Authorization policies.
//!
//! Each policy is a pure function of the acting user (and optionally a
//! target entity) returning a [`Decision`]. Handlers compose them explicitly
//! and turn a denial into a 403 via [`Decision::authorize`].

mod followup;
mod ticket;

pub use followup::FollowupPolicy;
pub use ticket::TicketPolicy;

use crate::auth::{Actor, Permission};
use crate::error::{HelpdeskError, Result, UNAUTHORIZED_ACTION};

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into `Forbidden`. The reason is logged, never shown.
    pub fn authorize(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(reason = %reason, "Policy denied action");
                Err(HelpdeskError::Forbidden(UNAUTHORIZED_ACTION.into()))
            }
        }
    }

    /// Both decisions must allow; the first denial wins.
    pub fn and(self, other: impl FnOnce() -> Decision) -> Decision {
        match self {
            Decision::Allow => other(),
            deny => deny,
        }
    }
}

pub(crate) fn require(actor: &Actor, permission: Permission) -> Decision {
    if actor.has_permission(permission) {
        Decision::Allow
    } else {
        Decision::Deny(format!(
            "user {} lacks permission '{}'",
            actor.id(),
            permission
        ))
    }
}

/// Passes when the actor holds the "view any tickets" override or `is_own`.
pub(crate) fn override_or_own(actor: &Actor, is_own: bool, what: &str) -> Decision {
    if actor.sees_all_tickets() || is_own {
        Decision::Allow
    } else {
        Decision::Deny(format!("user {} does not own {}", actor.id(), what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_maps_to_forbidden() {
        assert!(Decision::Allow.authorize().is_ok());
        match Decision::Deny("nope".into()).authorize() {
            Err(HelpdeskError::Forbidden(msg)) => assert_eq!(msg, UNAUTHORIZED_ACTION),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_and_short_circuits() {
        let d = Decision::Deny("first".into()).and(|| panic!("must not run"));
        assert_eq!(d, Decision::Deny("first".into()));
        assert_eq!(Decision::Allow.and(|| Decision::Allow), Decision::Allow);
    }
}
