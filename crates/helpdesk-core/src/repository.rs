//! Persistence seams. The runtime implements these over PostgreSQL; the
//! `testing` feature provides an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{Actor, Role};
use crate::error::Result;
use crate::filter::{PageRequest, TicketQuery};
use crate::model::{
    Attachment, AttachmentKind, AttachmentOwner, Followup, NewAttachment, NewFollowup, NewTicket,
    NewUser, Ticket, TicketFields, TicketWithOwner, User,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<Option<User>>;

    /// The user with roles and permissions resolved, or `None` if unknown.
    async fn load_actor(&self, user_id: i64) -> Result<Option<Actor>>;

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>>;

    async fn create_user(&self, user: NewUser, role: Role) -> Result<User>;

    async fn assign_role(&self, user_id: i64, role: Role) -> Result<()>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket>;

    async fn find_ticket(&self, id: i64) -> Result<Option<Ticket>>;

    /// Overwrite the editable fields; `None` if the ticket is gone.
    async fn update_ticket(&self, id: i64, fields: &TicketFields) -> Result<Option<Ticket>>;

    /// Remove the row and, by cascade, its followups and file metadata.
    async fn delete_ticket(&self, id: i64) -> Result<bool>;

    /// Matching rows (one page when `page` is set) and the total match count.
    async fn search_tickets(
        &self,
        query: &TicketQuery,
        page: Option<PageRequest>,
    ) -> Result<(Vec<TicketWithOwner>, u64)>;
}

#[async_trait]
pub trait FollowupRepository: Send + Sync {
    /// Fails with `DuplicateSolution` when a second solution is inserted.
    async fn insert_followup(&self, followup: NewFollowup) -> Result<Followup>;

    async fn find_followup(&self, id: i64) -> Result<Option<Followup>>;

    /// Oldest first.
    async fn followups_for_ticket(&self, ticket_id: i64) -> Result<Vec<Followup>>;

    async fn has_solution(&self, ticket_id: i64) -> Result<bool>;

    async fn update_followup_content(&self, id: i64, content: &str) -> Result<Option<Followup>>;

    async fn delete_followup(&self, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn insert_attachment(&self, attachment: NewAttachment) -> Result<Attachment>;

    async fn find_attachment(&self, kind: AttachmentKind, id: i64) -> Result<Option<Attachment>>;

    /// Oldest first.
    async fn attachments_for(&self, owner: AttachmentOwner) -> Result<Vec<Attachment>>;

    async fn delete_attachment(&self, kind: AttachmentKind, id: i64) -> Result<bool>;
}

/// Shared handles to every repository.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub tickets: Arc<dyn TicketRepository>,
    pub followups: Arc<dyn FollowupRepository>,
    pub attachments: Arc<dyn AttachmentRepository>,
}

impl Repositories {
    /// All four handles backed by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + TicketRepository
            + FollowupRepository
            + AttachmentRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            tickets: store.clone(),
            followups: store.clone(),
            attachments: store,
        }
    }
}
