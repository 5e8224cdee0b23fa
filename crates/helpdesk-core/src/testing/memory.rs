//! In-memory implementation of every repository trait.
//!
//! Mirrors the relational schema: deleting a ticket cascades to its
//! followups and all file metadata, a second solution on one ticket fails
//! with `DuplicateSolution`, and inserts referencing a missing owner fail.
//! Timestamps come from a logical clock that advances one second per write,
//! so `updated_at` ordering is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::auth::{Actor, Role};
use crate::error::{HelpdeskError, Result};
use crate::filter::{PageRequest, TicketQuery};
use crate::model::{
    Attachment, AttachmentKind, AttachmentOwner, Followup, FollowupType, NewAttachment,
    NewFollowup, NewTicket, NewUser, Ticket, TicketFields, TicketWithOwner, User,
};
use crate::repository::{
    AttachmentRepository, FollowupRepository, TicketRepository, UserRepository,
};

struct State {
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, BTreeSet<Role>>,
    tickets: BTreeMap<i64, Ticket>,
    followups: BTreeMap<i64, Followup>,
    ticket_files: BTreeMap<i64, Attachment>,
    followup_files: BTreeMap<i64, Attachment>,
    next_id: i64,
    clock: DateTime<Utc>,
    fail_writes: bool,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::seconds(1);
        self.clock
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            Err(HelpdeskError::Database("simulated write failure".into()))
        } else {
            Ok(())
        }
    }

    fn files(&self, kind: AttachmentKind) -> &BTreeMap<i64, Attachment> {
        match kind {
            AttachmentKind::Ticket => &self.ticket_files,
            AttachmentKind::Followup => &self.followup_files,
        }
    }

    fn files_mut(&mut self, kind: AttachmentKind) -> &mut BTreeMap<i64, Attachment> {
        match kind {
            AttachmentKind::Ticket => &mut self.ticket_files,
            AttachmentKind::Followup => &mut self.followup_files,
        }
    }

    fn remove_followup(&mut self, id: i64) -> bool {
        self.followup_files.retain(|_, f| f.owner_id != id);
        self.followups.remove(&id).is_some()
    }
}

/// In-memory store for service and handler tests.
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                users: BTreeMap::new(),
                roles: BTreeMap::new(),
                tickets: BTreeMap::new(),
                followups: BTreeMap::new(),
                ticket_files: BTreeMap::new(),
                followup_files: BTreeMap::new(),
                next_id: 0,
                clock: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
                fail_writes: false,
            }),
        }
    }

    /// Register a user with the given roles.
    pub fn add_user(&self, name: &str, roles: &[Role]) -> User {
        let mut state = self.state.lock().unwrap();
        let id = state.id();
        let now = state.tick();
        let user = User {
            id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, user.clone());
        state.roles.insert(id, roles.iter().copied().collect());
        user
    }

    /// The actor for a registered user.
    pub fn actor(&self, user: &User) -> Actor {
        let state = self.state.lock().unwrap();
        let roles = state.roles.get(&user.id).cloned().unwrap_or_default();
        Actor::from_roles(user.clone(), roles)
    }

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn ticket_count(&self) -> usize {
        self.state.lock().unwrap().tickets.len()
    }

    pub fn followup_count(&self) -> usize {
        self.state.lock().unwrap().followups.len()
    }

    pub fn attachment_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.ticket_files.len() + state.followup_files.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn load_actor(&self, user_id: i64) -> Result<Option<Actor>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.get(&user_id).map(|user| {
            let roles = state.roles.get(&user_id).cloned().unwrap_or_default();
            Actor::from_roles(user.clone(), roles)
        }))
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .filter(|u| state.roles.get(&u.id).is_some_and(|r| r.contains(&role)))
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: NewUser, role: Role) -> Result<User> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(HelpdeskError::InvalidArgument(format!(
                "Email already registered: {}",
                user.email
            )));
        }
        let id = state.id();
        let now = state.tick();
        let user = User {
            id,
            name: user.name,
            email: user.email,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, user.clone());
        state.roles.insert(id, BTreeSet::from([role]));
        Ok(user)
    }

    async fn assign_role(&self, user_id: i64, role: Role) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        if !state.users.contains_key(&user_id) {
            return Err(HelpdeskError::NotFound(format!("User {} not found", user_id)));
        }
        state.roles.entry(user_id).or_default().insert(role);
        Ok(())
    }
}

#[async_trait]
impl TicketRepository for MemoryStore {
    async fn insert_ticket(&self, ticket: NewTicket) -> Result<Ticket> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        if !state.users.contains_key(&ticket.user_id) {
            return Err(HelpdeskError::Database("tickets_user_id_fkey".into()));
        }
        let id = state.id();
        let now = state.tick();
        let row = Ticket {
            id,
            user_id: ticket.user_id,
            title: ticket.fields.title,
            description: ticket.fields.description,
            status: ticket.fields.status,
            priority: ticket.fields.priority,
            created_at: now,
            updated_at: now,
        };
        state.tickets.insert(id, row.clone());
        Ok(row)
    }

    async fn find_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        Ok(self.state.lock().unwrap().tickets.get(&id).cloned())
    }

    async fn update_ticket(&self, id: i64, fields: &TicketFields) -> Result<Option<Ticket>> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let now = state.tick();
        Ok(state.tickets.get_mut(&id).map(|t| {
            t.title = fields.title.clone();
            t.description = fields.description.clone();
            t.status = fields.status;
            t.priority = fields.priority;
            t.updated_at = now;
            t.clone()
        }))
    }

    async fn delete_ticket(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let followup_ids: Vec<i64> = state
            .followups
            .values()
            .filter(|f| f.ticket_id == id)
            .map(|f| f.id)
            .collect();
        for followup_id in followup_ids {
            state.remove_followup(followup_id);
        }
        state.ticket_files.retain(|_, f| f.owner_id != id);
        Ok(state.tickets.remove(&id).is_some())
    }

    async fn search_tickets(
        &self,
        query: &TicketQuery,
        page: Option<PageRequest>,
    ) -> Result<(Vec<TicketWithOwner>, u64)> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<TicketWithOwner> = state
            .tickets
            .values()
            .map(|t| TicketWithOwner {
                ticket: t.clone(),
                user_name: state
                    .users
                    .get(&t.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default(),
            })
            .filter(|row| query.matches(row))
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));

        let total = rows.len() as u64;
        let rows = match page {
            Some(page) => rows
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .collect(),
            None => rows,
        };
        Ok((rows, total))
    }
}

#[async_trait]
impl FollowupRepository for MemoryStore {
    async fn insert_followup(&self, followup: NewFollowup) -> Result<Followup> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        if !state.tickets.contains_key(&followup.ticket_id) {
            return Err(HelpdeskError::Database("followups_ticket_id_fkey".into()));
        }
        if followup.kind == FollowupType::Solution
            && state
                .followups
                .values()
                .any(|f| f.ticket_id == followup.ticket_id && f.kind == FollowupType::Solution)
        {
            return Err(HelpdeskError::DuplicateSolution);
        }
        let id = state.id();
        let now = state.tick();
        let row = Followup {
            id,
            ticket_id: followup.ticket_id,
            user_id: followup.user_id,
            kind: followup.kind,
            content: followup.content,
            created_at: now,
            updated_at: now,
        };
        state.followups.insert(id, row.clone());
        Ok(row)
    }

    async fn find_followup(&self, id: i64) -> Result<Option<Followup>> {
        Ok(self.state.lock().unwrap().followups.get(&id).cloned())
    }

    async fn followups_for_ticket(&self, ticket_id: i64) -> Result<Vec<Followup>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<Followup> = state
            .followups
            .values()
            .filter(|f| f.ticket_id == ticket_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn has_solution(&self, ticket_id: i64) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .followups
            .values()
            .any(|f| f.ticket_id == ticket_id && f.kind == FollowupType::Solution))
    }

    async fn update_followup_content(&self, id: i64, content: &str) -> Result<Option<Followup>> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let now = state.tick();
        Ok(state.followups.get_mut(&id).map(|f| {
            f.content = content.to_string();
            f.updated_at = now;
            f.clone()
        }))
    }

    async fn delete_followup(&self, id: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        Ok(state.remove_followup(id))
    }
}

#[async_trait]
impl AttachmentRepository for MemoryStore {
    async fn insert_attachment(&self, attachment: NewAttachment) -> Result<Attachment> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        let owner_exists = match attachment.owner {
            AttachmentOwner::Ticket(id) => state.tickets.contains_key(&id),
            AttachmentOwner::Followup(id) => state.followups.contains_key(&id),
        };
        if !owner_exists {
            return Err(HelpdeskError::Database(format!(
                "{} does not exist",
                attachment.owner
            )));
        }
        let kind = attachment.owner.kind();
        if state.files(kind).values().any(|f| f.filename == attachment.filename) {
            return Err(HelpdeskError::Database(format!(
                "{}_filename_key",
                kind.table()
            )));
        }
        let id = state.id();
        let now = state.tick();
        let row = Attachment {
            id,
            kind,
            owner_id: attachment.owner.id(),
            user_id: attachment.user_id,
            original_filename: attachment.original_filename,
            filename: attachment.filename,
            path: attachment.path,
            mime_type: attachment.mime_type,
            size: attachment.size,
            created_at: now,
            updated_at: now,
        };
        state.files_mut(kind).insert(id, row.clone());
        Ok(row)
    }

    async fn find_attachment(&self, kind: AttachmentKind, id: i64) -> Result<Option<Attachment>> {
        Ok(self.state.lock().unwrap().files(kind).get(&id).cloned())
    }

    async fn attachments_for(&self, owner: AttachmentOwner) -> Result<Vec<Attachment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files(owner.kind())
            .values()
            .filter(|f| f.owner_id == owner.id())
            .cloned()
            .collect())
    }

    async fn delete_attachment(&self, kind: AttachmentKind, id: i64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.check_writable()?;
        Ok(state.files_mut(kind).remove(&id).is_some())
    }
}
