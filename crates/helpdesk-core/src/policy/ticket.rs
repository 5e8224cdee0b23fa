use super::{override_or_own, require, Decision};
use crate::auth::{Actor, Permission};
use crate::model::Ticket;

/// Ticket policy.
pub struct TicketPolicy;

impl TicketPolicy {
    pub fn view(actor: &Actor, ticket: &Ticket) -> Decision {
        Self::owned_action(actor, ticket, Permission::ViewTickets)
    }

    /// Listing needs "view tickets"; rows are scoped by the query.
    pub fn list(actor: &Actor) -> Decision {
        require(actor, Permission::ViewTickets)
    }

    pub fn create(actor: &Actor) -> Decision {
        require(actor, Permission::CreateTickets)
    }

    pub fn update(actor: &Actor, ticket: &Ticket) -> Decision {
        Self::owned_action(actor, ticket, Permission::UpdateTickets)
    }

    pub fn delete(actor: &Actor, ticket: &Ticket) -> Decision {
        Self::owned_action(actor, ticket, Permission::DeleteTickets)
    }

    fn owned_action(actor: &Actor, ticket: &Ticket, permission: Permission) -> Decision {
        require(actor, permission).and(|| {
            override_or_own(
                actor,
                ticket.is_owned_by(actor.id()),
                &format!("ticket {}", ticket.id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::model::{TicketPriority, TicketStatus, User};
    use chrono::Utc;

    fn user(id: i64) -> User {
        User {
            id,
            name: format!("u{id}"),
            email: format!("u{id}@example.com"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ticket(owner: i64) -> Ticket {
        Ticket {
            id: 100,
            user_id: owner,
            title: "Printer broken".into(),
            description: "It jams".into(),
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_view_truth_table() {
        // view(U, T) <=> view tickets AND (view any tickets OR owner)
        for has_view in [false, true] {
            for has_any in [false, true] {
                for is_owner in [false, true] {
                    let mut perms = Vec::new();
                    if has_view {
                        perms.push(Permission::ViewTickets);
                    }
                    if has_any {
                        perms.push(Permission::ViewAnyTickets);
                    }
                    let actor = Actor::new(user(1), [], perms);
                    let t = ticket(if is_owner { 1 } else { 2 });

                    let expected = has_view && (has_any || is_owner);
                    assert_eq!(
                        TicketPolicy::view(&actor, &t).is_allowed(),
                        expected,
                        "view={has_view} any={has_any} owner={is_owner}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_update_and_delete_mirror_view() {
        let owner = Actor::from_roles(user(1), [Role::User]);
        let stranger = Actor::from_roles(user(2), [Role::User]);
        let admin = Actor::from_roles(user(3), [Role::Admin]);
        let t = ticket(1);

        assert!(TicketPolicy::update(&owner, &t).is_allowed());
        assert!(TicketPolicy::delete(&owner, &t).is_allowed());
        assert!(!TicketPolicy::update(&stranger, &t).is_allowed());
        assert!(!TicketPolicy::delete(&stranger, &t).is_allowed());
        assert!(TicketPolicy::update(&admin, &t).is_allowed());
        assert!(TicketPolicy::delete(&admin, &t).is_allowed());
    }

    #[test]
    fn test_owner_without_permission_is_denied() {
        let actor = Actor::new(user(1), [], [Permission::ViewTickets]);
        let t = ticket(1);
        assert!(TicketPolicy::view(&actor, &t).is_allowed());
        assert!(!TicketPolicy::update(&actor, &t).is_allowed());
        assert!(!TicketPolicy::delete(&actor, &t).is_allowed());
    }

    #[test]
    fn test_create() {
        assert!(TicketPolicy::create(&Actor::from_roles(user(1), [Role::User])).is_allowed());
        assert!(!TicketPolicy::create(&Actor::from_roles(user(1), [])).is_allowed());
    }

    #[test]
    fn test_list() {
        assert!(TicketPolicy::list(&Actor::from_roles(user(1), [Role::User])).is_allowed());
        assert!(!TicketPolicy::list(&Actor::new(user(1), [], [Permission::CreateTickets])).is_allowed());
    }
}
