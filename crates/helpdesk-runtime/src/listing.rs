//! Ticket listing: visibility, filters, sort and pagination.

use std::sync::Arc;

use serde::Serialize;

use helpdesk_core::auth::Actor;
use helpdesk_core::error::Result;
use helpdesk_core::filter::{ListParams, Page, TicketFilters, TicketQuery, TicketSort};
use helpdesk_core::model::TicketWithOwner;
use helpdesk_core::policy::TicketPolicy;
use helpdesk_core::repository::TicketRepository;

/// Either one page or the full matching set.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TicketResults {
    Page(Page<TicketWithOwner>),
    All(Vec<TicketWithOwner>),
}

impl TicketResults {
    pub fn rows(&self) -> &[TicketWithOwner] {
        match self {
            TicketResults::Page(page) => &page.data,
            TicketResults::All(rows) => rows,
        }
    }
}

/// Listing response: the results plus the criteria that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct TicketListing {
    pub tickets: TicketResults,
    pub filters: TicketFilters,
    pub sort: TicketSort,
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct TicketFilterService {
    tickets: Arc<dyn TicketRepository>,
}

impl TicketFilterService {
    pub fn new(tickets: Arc<dyn TicketRepository>) -> Self {
        Self { tickets }
    }

    pub async fn list(&self, actor: &Actor, params: ListParams) -> Result<TicketListing> {
        TicketPolicy::list(actor).authorize()?;

        let query = TicketQuery::for_actor(actor, params.filters, params.sort);
        let tickets = if params.all {
            let (rows, _) = self.tickets.search_tickets(&query, None).await?;
            TicketResults::All(rows)
        } else {
            let (rows, total) = self.tickets.search_tickets(&query, Some(params.page)).await?;
            TicketResults::Page(Page::new(rows, params.page, total))
        };

        tracing::debug!(
            user_id = actor.id(),
            sort = %query.sort,
            count = tickets.rows().len(),
            "Listed tickets"
        );

        Ok(TicketListing {
            tickets,
            filters: query.filters,
            sort: query.sort,
            is_admin: actor.is_admin(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use helpdesk_core::auth::Role;
    use helpdesk_core::filter::PageRequest;
    use helpdesk_core::model::{NewTicket, TicketFields, TicketPriority, TicketStatus, User};
    use helpdesk_core::testing::MemoryStore;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let query: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ListParams::from_query(&query)
    }

    async fn open_ticket(store: &MemoryStore, owner: &User, title: &str, priority: TicketPriority) {
        store
            .insert_ticket(NewTicket {
                user_id: owner.id,
                fields: TicketFields {
                    title: title.into(),
                    description: format!("{} description", title),
                    status: TicketStatus::Open,
                    priority,
                },
            })
            .await
            .unwrap();
    }

    fn titles(listing: &TicketListing) -> Vec<String> {
        listing
            .tickets
            .rows()
            .iter()
            .map(|t| t.ticket.title.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_visibility_scenario() {
        let store = Arc::new(MemoryStore::new());
        let service = TicketFilterService::new(store.clone());
        let a = store.add_user("Admin", &[Role::Admin]);
        let b = store.add_user("Bea", &[Role::User]);
        let c = store.add_user("Cid", &[Role::User]);
        let d = store.add_user("Dee", &[Role::User]);

        open_ticket(&store, &b, "Printer broken", TicketPriority::Medium).await;
        open_ticket(&store, &d, "Monitor flicker", TicketPriority::Low).await;

        let as_b = service.list(&store.actor(&b), ListParams::default()).await.unwrap();
        assert_eq!(titles(&as_b), vec!["Printer broken"]);
        assert!(!as_b.is_admin);

        let as_a = service.list(&store.actor(&a), ListParams::default()).await.unwrap();
        assert!(titles(&as_a).contains(&"Printer broken".to_string()));
        assert_eq!(as_a.tickets.rows().len(), 2);
        assert!(as_a.is_admin);

        let as_c = service.list(&store.actor(&c), ListParams::default()).await.unwrap();
        assert!(as_c.tickets.rows().is_empty());
    }

    #[tokio::test]
    async fn test_same_query_twice_is_identical() {
        let store = Arc::new(MemoryStore::new());
        let service = TicketFilterService::new(store.clone());
        let admin = store.actor(&store.add_user("Admin", &[Role::Admin]));
        let owner = store.add_user("Bea", &[Role::User]);
        for (title, priority) in [
            ("VPN down", TicketPriority::High),
            ("VPN slow", TicketPriority::High),
            ("Printer", TicketPriority::Low),
            ("vpn token", TicketPriority::High),
        ] {
            open_ticket(&store, &owner, title, priority).await;
        }

        let p = params(&[
            ("filters[title]", "vpn"),
            ("sort[field]", "priority"),
            ("sort[order]", "asc"),
        ]);
        let first = service.list(&admin, p.clone()).await.unwrap();
        let second = service.list(&admin, p).await.unwrap();

        assert_eq!(first.tickets.rows(), second.tickets.rows());
        assert_eq!(first.tickets.rows().len(), 3);
        // equal priorities tie-break on id, ascending here
        assert_eq!(titles(&first), vec!["VPN down", "VPN slow", "vpn token"]);
    }

    #[tokio::test]
    async fn test_owner_name_filter_needs_override() {
        let store = Arc::new(MemoryStore::new());
        let service = TicketFilterService::new(store.clone());
        let admin = store.add_user("Admin", &[Role::Admin]);
        let bea = store.add_user("Bea", &[Role::User]);
        let cid = store.add_user("Cid", &[Role::User]);
        open_ticket(&store, &bea, "Bea's laptop", TicketPriority::Low).await;
        open_ticket(&store, &cid, "Cid's phone", TicketPriority::Low).await;

        let p = params(&[("filters[user_name]", "cid")]);

        let as_admin = service.list(&store.actor(&admin), p.clone()).await.unwrap();
        assert_eq!(titles(&as_admin), vec!["Cid's phone"]);
        assert_eq!(as_admin.filters.user_name.as_deref(), Some("cid"));

        let as_bea = service.list(&store.actor(&bea), p).await.unwrap();
        assert_eq!(titles(&as_bea), vec!["Bea's laptop"]);
        assert_eq!(as_bea.filters.user_name, None);
    }

    #[tokio::test]
    async fn test_paging_and_all() {
        let store = Arc::new(MemoryStore::new());
        let service = TicketFilterService::new(store.clone());
        let bea = store.add_user("Bea", &[Role::User]);
        let actor = store.actor(&bea);
        for i in 0..5 {
            open_ticket(&store, &bea, &format!("T{}", i), TicketPriority::Low).await;
        }

        let listing = service
            .list(&actor, params(&[("per_page", "2"), ("page", "3")]))
            .await
            .unwrap();
        match &listing.tickets {
            TicketResults::Page(page) => {
                assert_eq!(page.total, 5);
                assert_eq!(page.last_page, 3);
                assert_eq!(page.current_page, 3);
                assert_eq!(page.data.len(), 1);
                assert_eq!(page.from, Some(5));
            }
            TicketResults::All(_) => panic!("expected a page"),
        }

        let listing = service.list(&actor, params(&[("all", "true")])).await.unwrap();
        assert!(matches!(listing.tickets, TicketResults::All(ref rows) if rows.len() == 5));

        let fallback = params(&[("per_page", "500")]);
        assert_eq!(fallback.page, PageRequest::default());
    }

    #[tokio::test]
    async fn test_listing_needs_view_permission() {
        let store = Arc::new(MemoryStore::new());
        let service = TicketFilterService::new(store.clone());
        let nobody = store.actor(&store.add_user("Nobody", &[]));
        assert!(service.list(&nobody, ListParams::default()).await.is_err());
    }

    #[test]
    fn test_listing_serializes_page_inline() {
        let listing = TicketListing {
            tickets: TicketResults::Page(Page::new(Vec::new(), PageRequest::default(), 0)),
            filters: TicketFilters::default(),
            sort: TicketSort::default(),
            is_admin: false,
        };
        let json = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["tickets"]["per_page"], 15);
        assert_eq!(json["sort"]["field"], "updated_at");
        assert_eq!(json["is_admin"], false);
    }
}
