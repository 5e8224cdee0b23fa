mod actor;
mod claims;
mod context;
mod permissions;

pub use actor::Actor;
pub use claims::{Claims, ClaimsBuilder};
pub use context::AuthContext;
pub use permissions::{permissions_for, Permission, Role};
