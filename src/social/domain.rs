// Friendship domain types - pure, no database access
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Friendship request messages are cut to this many characters.
pub const MESSAGE_MAX_CHARS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Sent,
    Accepted,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Sent => "sent",
            RequestStatus::Accepted => "accepted",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recipient's answer to a pending request, parsed from the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl FromStr for Decision {
    type Err = SocialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Decision::Accept),
            "rejected" => Ok(Decision::Reject),
            other => Err(SocialError::UnknownDecision(other.to_string())),
        }
    }
}

/// Result of asking to befriend someone. Only `Created` writes anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Created { request_id: String },
    AlreadyFriends,
    AlreadyPending,
}

impl SendOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SendOutcome::Created { .. } => "friendship request created",
            SendOutcome::AlreadyFriends => "already friends",
            SendOutcome::AlreadyPending => "request already sent",
        }
    }
}

/// How a viewer stands towards another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub is_friend: bool,
    pub can_send_friendship_request: bool,
}

impl Relationship {
    pub fn evaluate(is_self: bool, is_friend: bool, request_exists: bool) -> Self {
        Self {
            is_friend,
            can_send_friendship_request: !is_self && !is_friend && !request_exists,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocialError {
    #[error("user not found")]
    UserNotFound,

    #[error("cannot send a friendship request to yourself")]
    SelfRequest,

    #[error("no pending friendship request from this user")]
    RequestNotFound,

    #[error("this user is not your friend")]
    NotFriends,

    #[error("unknown request status: {0}")]
    UnknownDecision(String),
}

/// Cut a request message to [`MESSAGE_MAX_CHARS`] characters.
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MESSAGE_MAX_CHARS).collect()
}
