pub mod auth;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod notification;
pub mod policy;
pub mod repository;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auth::{Actor, AuthContext, Claims, ClaimsBuilder, Permission, Role};
pub use config::HelpdeskConfig;
pub use error::{HelpdeskError, Result};
pub use filter::{ListParams, Page, PageRequest, TicketFilters, TicketQuery, TicketSort};
pub use notification::{MailOutbox, OutboundMail, Recipient};
pub use policy::{Decision, FollowupPolicy, TicketPolicy};
pub use repository::{
    AttachmentRepository, FollowupRepository, Repositories, TicketRepository, UserRepository,
};
pub use validation::{ValidationErrors, Validator};
