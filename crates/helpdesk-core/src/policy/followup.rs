use super::{override_or_own, require, Decision};
use crate::auth::{Actor, Permission};
use crate::model::{Followup, FollowupType};

/// Followup policy.
///
/// `update` is author-only even for admins; `delete` accepts the
/// "view any tickets" override.
pub struct FollowupPolicy;

impl FollowupPolicy {
    pub fn view(actor: &Actor) -> Decision {
        require(actor, Permission::ViewFollowups)
    }

    pub fn create(actor: &Actor) -> Decision {
        require(actor, Permission::CreateFollowups)
    }

    pub fn create_comment(actor: &Actor) -> Decision {
        require(actor, Permission::CreateCommentFollowups)
    }

    pub fn create_solution(actor: &Actor) -> Decision {
        require(actor, Permission::CreateSolutionFollowups)
    }

    /// The fine-grained check for a given followup type.
    pub fn create_of_type(actor: &Actor, kind: FollowupType) -> Decision {
        match kind {
            FollowupType::Comment => Self::create_comment(actor),
            FollowupType::Solution => Self::create_solution(actor),
        }
    }

    pub fn update(actor: &Actor, followup: &Followup) -> Decision {
        require(actor, Permission::UpdateFollowups).and(|| {
            if followup.is_authored_by(actor.id()) {
                Decision::Allow
            } else {
                Decision::Deny(format!(
                    "user {} is not the author of followup {}",
                    actor.id(),
                    followup.id
                ))
            }
        })
    }

    pub fn delete(actor: &Actor, followup: &Followup) -> Decision {
        require(actor, Permission::DeleteFollowups).and(|| {
            override_or_own(
                actor,
                followup.is_authored_by(actor.id()),
                &format!("followup {}", followup.id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::model::User;
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

    fn followup(author: i64) -> Followup {
        Followup {
            id: 7,
            ticket_id: 1,
            user_id: author,
            kind: FollowupType::Comment,
            content: "Have you tried turning it off and on?".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_entity_independent_checks() {
        let user_actor = Actor::from_roles(user(1), [Role::User]);
        let admin = Actor::from_roles(user(2), [Role::Admin]);

        assert!(FollowupPolicy::view(&user_actor).is_allowed());
        assert!(FollowupPolicy::create(&user_actor).is_allowed());
        assert!(FollowupPolicy::create_comment(&user_actor).is_allowed());
        assert!(FollowupPolicy::create_solution(&user_actor).is_allowed());
        assert!(FollowupPolicy::create_solution(&admin).is_allowed());

        let commenter = Actor::new(
            user(3),
            [],
            [Permission::CreateFollowups, Permission::CreateCommentFollowups],
        );
        assert!(!FollowupPolicy::create_solution(&commenter).is_allowed());
    }

    #[test]
    fn test_type_check_is_separate_from_generic_create() {
        let only_solution = Actor::new(user(1), [], [Permission::CreateSolutionFollowups]);
        assert!(!FollowupPolicy::create(&only_solution).is_allowed());
        assert!(FollowupPolicy::create_of_type(&only_solution, FollowupType::Solution).is_allowed());
        assert!(!FollowupPolicy::create_of_type(&only_solution, FollowupType::Comment).is_allowed());
    }

    #[test]
    fn test_update_is_author_only() {
        let author = Actor::from_roles(user(1), [Role::User]);
        let admin = Actor::from_roles(user(2), [Role::Admin]);
        let f = followup(1);

        assert!(FollowupPolicy::update(&author, &f).is_allowed());
        assert!(!FollowupPolicy::update(&admin, &f).is_allowed());
    }

    #[test]
    fn test_delete_allows_override() {
        let author = Actor::from_roles(user(1), [Role::User]);
        let stranger = Actor::from_roles(user(3), [Role::User]);
        let admin = Actor::from_roles(user(2), [Role::Admin]);
        let f = followup(1);

        assert!(FollowupPolicy::delete(&author, &f).is_allowed());
        assert!(FollowupPolicy::delete(&admin, &f).is_allowed());
        assert!(!FollowupPolicy::delete(&stranger, &f).is_allowed());
    }

    #[test]
    fn test_author_without_permission_is_denied() {
        let actor = Actor::new(user(1), [], []);
        let f = followup(1);
        assert!(!FollowupPolicy::update(&actor, &f).is_allowed());
        assert!(!FollowupPolicy::delete(&actor, &f).is_allowed());
    }
}
