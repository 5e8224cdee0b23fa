//! Helpdesk: support tickets with threaded followups, file attachments and
//! mail notifications, served over HTTP.

pub mod logging;
mod runtime;

pub use runtime::{Helpdesk, HelpdeskBuilder};
