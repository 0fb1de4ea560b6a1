use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status shared by users, steps and tasks. `Accepted` and
/// `Rejected` are terminal: once a user reaches either, its cursors freeze
/// and no further progression happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "not completed")]
    NotCompleted,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "rejected")]
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotCompleted => "not completed",
            Status::InProgress => "in progress",
            Status::Completed => "completed",
            Status::Accepted => "accepted",
            Status::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
