use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HelpdeskError;
use crate::model::{Attachment, UserSummary};

/// Kind of reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowupType {
    Comment,
    Solution,
}

impl FollowupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowupType::Comment => "comment",
            FollowupType::Solution => "solution",
        }
    }

    /// Phrase used in notifications ("added a solution").
    pub fn article_phrase(&self) -> &'static str {
        match self {
            FollowupType::Comment => "a comment",
            FollowupType::Solution => "a solution",
        }
    }
}

impl fmt::Display for FollowupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FollowupType {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(FollowupType::Comment),
            "solution" => Ok(FollowupType::Solution),
            other => Err(HelpdeskError::InvalidArgument(format!(
                "Invalid followup type: {}",
                other
            ))),
        }
    }
}

/// A threaded reply on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Followup {
    pub id: i64,
    pub ticket_id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: FollowupType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Followup {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewFollowup {
    pub ticket_id: i64,
    pub user_id: i64,
    pub kind: FollowupType,
    pub content: String,
}

/// A followup with its author and files, as shown in a ticket thread.
#[derive(Debug, Clone, Serialize)]
pub struct FollowupDetail {
    #[serde(flatten)]
    pub followup: Followup,
    pub user: Option<UserSummary>,
    pub files: Vec<Attachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse() {
        assert_eq!(
            "solution".parse::<FollowupType>().unwrap(),
            FollowupType::Solution
        );
        assert!("answer".parse::<FollowupType>().is_err());
    }

    #[test]
    fn test_type_field_serialized_as_type() {
        let f = Followup {
            id: 1,
            ticket_id: 2,
            user_id: 3,
            kind: FollowupType::Comment,
            content: "hi".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["type"], "comment");
    }
}
