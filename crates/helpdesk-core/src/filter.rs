//! Ticket listing parameters: filters, sort and pagination.
//!
//! Query strings use bracket keys (`filters[title]=printer`,
//! `sort[field]=user_name`). Empty values are treated as absent. The same
//! [`TicketQuery`] drives the SQL builder and the in-memory predicate so
//! both backends agree on what a filter means.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::Actor;
use crate::model::TicketWithOwner;

/// Default page size when `per_page` is missing or out of range.
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Largest accepted page size.
pub const MAX_PER_PAGE: u32 = 100;

/// Optional filter criteria. `None` means "no filter on this dimension".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl TicketFilters {
    /// Read `filters[...]` keys; empty strings become `None`.
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let get = |name: &str| non_empty(query.get(&format!("filters[{}]", name)));
        Self {
            id: get("id"),
            title: get("title"),
            description: get("description"),
            status: get("status"),
            priority: get("priority"),
            user_name: get("user_name"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &TicketFilters::default()
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Sortable columns. `UserName` sorts on the joined owner name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Title,
    Description,
    Status,
    Priority,
    UserId,
    CreatedAt,
    UpdatedAt,
    UserName,
}

impl SortField {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "id" => SortField::Id,
            "title" => SortField::Title,
            "description" => SortField::Description,
            "status" => SortField::Status,
            "priority" => SortField::Priority,
            "user_id" => SortField::UserId,
            "created_at" => SortField::CreatedAt,
            "updated_at" => SortField::UpdatedAt,
            "user_name" => SortField::UserName,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Status => "status",
            SortField::Priority => "priority",
            SortField::UserId => "user_id",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::UserName => "user_name",
        }
    }

    /// Qualified SQL column.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "tickets.id",
            SortField::Title => "tickets.title",
            SortField::Description => "tickets.description",
            SortField::Status => "tickets.status",
            SortField::Priority => "tickets.priority",
            SortField::UserId => "tickets.user_id",
            SortField::CreatedAt => "tickets.created_at",
            SortField::UpdatedAt => "tickets.updated_at",
            SortField::UserName => "users.name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Effective sort. Unknown fields fall back to `updated_at`, unknown
/// orders to `desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for TicketSort {
    fn default() -> Self {
        Self {
            field: SortField::UpdatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl TicketSort {
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        let default = Self::default();
        Self {
            field: query
                .get("sort[field]")
                .and_then(|f| SortField::parse(f))
                .unwrap_or(default.field),
            order: query
                .get("sort[order]")
                .and_then(|o| SortOrder::parse(o))
                .unwrap_or(default.order),
        }
    }
}

/// Requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Clamp raw values: per_page outside 1..=100 or unparseable becomes 15,
    /// page below 1 or unparseable becomes 1.
    pub fn from_raw(page: Option<&str>, per_page: Option<&str>) -> Self {
        let per_page = per_page
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0 && *v <= MAX_PER_PAGE as i64)
            .map(|v| v as u32)
            .unwrap_or(DEFAULT_PER_PAGE);
        let page = page
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v >= 1 && *v <= u32::MAX as i64)
            .map(|v| v as u32)
            .unwrap_or(1);
        Self { page, per_page }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }

    pub fn limit(&self) -> u64 {
        self.per_page as u64
    }
}

/// Everything a listing request can carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub filters: TicketFilters,
    pub sort: TicketSort,
    pub page: PageRequest,
    /// Return the full matching set instead of a page.
    pub all: bool,
}

impl ListParams {
    pub fn from_query(query: &HashMap<String, String>) -> Self {
        Self {
            filters: TicketFilters::from_query(query),
            sort: TicketSort::from_query(query),
            page: PageRequest::from_raw(
                query.get("page").map(String::as_str),
                query.get("per_page").map(String::as_str),
            ),
            all: matches!(
                query.get("all").map(String::as_str),
                Some("1" | "true" | "yes")
            ),
        }
    }
}

/// Which tickets the caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    OwnedBy(i64),
}

/// A visibility-scoped, filtered, sorted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    pub visibility: Visibility,
    pub filters: TicketFilters,
    pub sort: TicketSort,
}

impl TicketQuery {
    /// Scope to the actor. The owner-name filter is dropped for callers
    /// without the "view any tickets" override.
    pub fn for_actor(actor: &Actor, mut filters: TicketFilters, sort: TicketSort) -> Self {
        let visibility = if actor.sees_all_tickets() {
            Visibility::All
        } else {
            filters.user_name = None;
            Visibility::OwnedBy(actor.id())
        };
        Self {
            visibility,
            filters,
            sort,
        }
    }

    /// In-memory predicate with the same meaning as the SQL filter.
    pub fn matches(&self, row: &TicketWithOwner) -> bool {
        let t = &row.ticket;
        if let Visibility::OwnedBy(user_id) = self.visibility {
            if t.user_id != user_id {
                return false;
            }
        }
        let f = &self.filters;
        if let Some(prefix) = &f.id {
            if !t.id.to_string().starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &f.title {
            if !contains_ci(&t.title, needle) {
                return false;
            }
        }
        if let Some(needle) = &f.description {
            if !contains_ci(&t.description, needle) {
                return false;
            }
        }
        if let Some(status) = &f.status {
            if t.status.as_str() != status {
                return false;
            }
        }
        if let Some(priority) = &f.priority {
            if t.priority.as_str() != priority {
                return false;
            }
        }
        if let Some(needle) = &f.user_name {
            if !contains_ci(&row.user_name, needle) {
                return false;
            }
        }
        true
    }

    /// Ordering for the in-memory backend; ties break on id in the same
    /// direction.
    pub fn compare(&self, a: &TicketWithOwner, b: &TicketWithOwner) -> Ordering {
        let (x, y) = (&a.ticket, &b.ticket);
        let primary = match self.sort.field {
            SortField::Id => x.id.cmp(&y.id),
            SortField::Title => x.title.cmp(&y.title),
            SortField::Description => x.description.cmp(&y.description),
            SortField::Status => x.status.as_str().cmp(y.status.as_str()),
            SortField::Priority => x.priority.as_str().cmp(y.priority.as_str()),
            SortField::UserId => x.user_id.cmp(&y.user_id),
            SortField::CreatedAt => x.created_at.cmp(&y.created_at),
            SortField::UpdatedAt => x.updated_at.cmp(&y.updated_at),
            SortField::UserName => a.user_name.cmp(&b.user_name),
        };
        self.sort.order.apply(primary.then(x.id.cmp(&y.id)))
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A page of results with its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let per_page = request.per_page.max(1) as u64;
        let last_page = total.div_ceil(per_page).max(1) as u32;
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let from = request.offset() + 1;
            (Some(from), Some(from + data.len() as u64 - 1))
        };
        Self {
            data,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page,
            from,
            to,
        }
    }
}

impl fmt::Display for TicketSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.order.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::model::{Ticket, TicketPriority, TicketStatus, User};
    use chrono::{Duration, Utc};

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn actor(id: i64, role: Role) -> Actor {
        let now = Utc::now();
        Actor::from_roles(
            User {
                id,
                name: format!("u{id}"),
                email: format!("u{id}@example.com"),
                created_at: now,
                updated_at: now,
            },
            [role],
        )
    }

    fn row(id: i64, owner: i64, owner_name: &str, title: &str, minutes_ago: i64) -> TicketWithOwner {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        TicketWithOwner {
            ticket: Ticket {
                id,
                user_id: owner,
                title: title.into(),
                description: format!("about {title}"),
                status: TicketStatus::Open,
                priority: TicketPriority::Medium,
                created_at: at,
                updated_at: at,
            },
            user_name: owner_name.into(),
        }
    }

    #[test]
    fn test_empty_values_are_absent() {
        let f = TicketFilters::from_query(&query(&[
            ("filters[status]", ""),
            ("filters[priority]", "high"),
        ]));
        assert_eq!(f.status, None);
        assert_eq!(f.priority.as_deref(), Some("high"));
        assert!(TicketFilters::from_query(&query(&[])).is_empty());
    }

    #[test]
    fn test_sort_fallbacks() {
        let s = TicketSort::from_query(&query(&[("sort[field]", "password"), ("sort[order]", "sideways")]));
        assert_eq!(s, TicketSort::default());

        let s = TicketSort::from_query(&query(&[("sort[field]", "user_name"), ("sort[order]", "ASC")]));
        assert_eq!(s.field, SortField::UserName);
        assert_eq!(s.order, SortOrder::Asc);
    }

    #[test]
    fn test_per_page_clamping() {
        assert_eq!(PageRequest::from_raw(None, None).per_page, 15);
        assert_eq!(PageRequest::from_raw(None, Some("0")).per_page, 15);
        assert_eq!(PageRequest::from_raw(None, Some("-3")).per_page, 15);
        assert_eq!(PageRequest::from_raw(None, Some("101")).per_page, 15);
        assert_eq!(PageRequest::from_raw(None, Some("abc")).per_page, 15);
        assert_eq!(PageRequest::from_raw(None, Some("100")).per_page, 100);
        assert_eq!(PageRequest::from_raw(Some("0"), None).page, 1);
        assert_eq!(PageRequest::from_raw(Some("3"), Some("10")).offset(), 20);
    }

    #[test]
    fn test_list_params_all_flag() {
        assert!(ListParams::from_query(&query(&[("all", "true")])).all);
        assert!(!ListParams::from_query(&query(&[("all", "no")])).all);
    }

    #[test]
    fn test_non_admin_scope_drops_user_name() {
        let filters = TicketFilters {
            user_name: Some("bob".into()),
            ..Default::default()
        };
        let q = TicketQuery::for_actor(&actor(5, Role::User), filters.clone(), TicketSort::default());
        assert_eq!(q.visibility, Visibility::OwnedBy(5));
        assert_eq!(q.filters.user_name, None);

        let q = TicketQuery::for_actor(&actor(1, Role::Admin), filters, TicketSort::default());
        assert_eq!(q.visibility, Visibility::All);
        assert_eq!(q.filters.user_name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_matches() {
        let r = row(123, 2, "Bob Smith", "Printer broken", 0);
        let admin = actor(1, Role::Admin);
        let q = |filters: TicketFilters| TicketQuery::for_actor(&admin, filters, TicketSort::default());

        assert!(q(TicketFilters::default()).matches(&r));
        assert!(q(TicketFilters { id: Some("12".into()), ..Default::default() }).matches(&r));
        assert!(!q(TicketFilters { id: Some("23".into()), ..Default::default() }).matches(&r));
        assert!(q(TicketFilters { title: Some("PRINTER".into()), ..Default::default() }).matches(&r));
        assert!(q(TicketFilters { description: Some("broken".into()), ..Default::default() }).matches(&r));
        assert!(q(TicketFilters { status: Some("open".into()), ..Default::default() }).matches(&r));
        assert!(!q(TicketFilters { status: Some("bogus".into()), ..Default::default() }).matches(&r));
        assert!(!q(TicketFilters { priority: Some("low".into()), ..Default::default() }).matches(&r));
        assert!(q(TicketFilters { user_name: Some("smith".into()), ..Default::default() }).matches(&r));

        let owner_scope = TicketQuery::for_actor(&actor(3, Role::User), TicketFilters::default(), TicketSort::default());
        assert!(!owner_scope.matches(&r));
    }

    #[test]
    fn test_compare_is_deterministic() {
        let mut rows = vec![
            row(1, 1, "Zed", "b", 5),
            row(2, 1, "Amy", "a", 5),
            row(3, 1, "Amy", "c", 1),
        ];
        let admin = actor(1, Role::Admin);

        let q = TicketQuery::for_actor(&admin, TicketFilters::default(), TicketSort::default());
        rows.sort_by(|a, b| q.compare(a, b));
        // newest first
        assert_eq!(rows[0].ticket.id, 3);

        let by_name = TicketQuery::for_actor(
            &admin,
            TicketFilters::default(),
            TicketSort { field: SortField::UserName, order: SortOrder::Asc },
        );
        rows.sort_by(|a, b| by_name.compare(a, b));
        let ids: Vec<i64> = rows.iter().map(|r| r.ticket.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let mut again = rows.clone();
        again.reverse();
        again.sort_by(|a, b| by_name.compare(a, b));
        assert_eq!(again, rows);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_page_metadata() {
        let page = Page::new(vec![1, 2, 3], PageRequest { page: 2, per_page: 3 }, 7);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.from, Some(4));
        assert_eq!(page.to, Some(6));

        let empty: Page<i32> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.last_page, 1);
        assert_eq!(empty.from, None);
    }
}
