//! Ticket and followup lifecycles.
//!
//! Each mutation runs as one explicit sequence: policy, validation, write,
//! file cascade, and only then notifications. Notifications never fail the
//! request.

mod followups;
mod input;
mod notifier;
mod tickets;

pub use followups::{CreatedFollowup, FollowupService};
pub use input::{FollowupFields, FollowupInput, FollowupUpdate, TicketInput, MAX_TITLE_CHARS};
pub use notifier::Notifier;
pub use tickets::{CreatedTicket, TicketService};
