use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. Credentials live outside this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// The part of a user exposed next to tickets and followups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

/// Input for registering a user from the CLI.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}
