//! Normalized representation of an inbound webhook delivery.
//!
//! An [`Event`] is built by the [`EventParser`](crate::parser::EventParser)
//! once the delivery signature has been verified. It is never mutated after
//! construction and is owned by the worker task that processes it.

use crate::{EventId, Timestamp};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One normalized webhook delivery
#[derive(Debug, Clone)]
pub struct Event {
    /// Delivery identifier, supplied by the platform or generated
    pub id: EventId,

    /// Event category such as `push` or `pull_request`
    pub event_type: String,

    /// Sub-action for compound event types, empty when not applicable
    pub action: String,

    pub repository: Option<RepositoryInfo>,

    pub sender: Option<SenderInfo>,

    /// Type-specific payload, or a generic structure for unknown types
    pub payload: EventPayload,

    /// Request body as received
    pub raw_payload: Bytes,

    pub received_at: Timestamp,

    /// Platform-prefixed request headers, lower-cased
    pub headers: HashMap<String, String>,
}

impl Event {
    /// Event type used for `event_type` conditions.
    ///
    /// Returns `type.action` when the event carries an action, otherwise the
    /// bare type.
    pub fn qualified_type(&self) -> String {
        if self.action.is_empty() {
            self.event_type.clone()
        } else {
            format!("{}.{}", self.event_type, self.action)
        }
    }

    pub fn repository_name(&self) -> &str {
        self.repository
            .as_ref()
            .map(|r| r.name.as_str())
            .unwrap_or_default()
    }

    pub fn repository_full_name(&self) -> &str {
        self.repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .unwrap_or_default()
    }

    pub fn sender_login(&self) -> &str {
        self.sender
            .as_ref()
            .map(|s| s.login.as_str())
            .unwrap_or_default()
    }
}

// ============================================================================
// Repository and Sender
// ============================================================================

/// Normalized subset of the repository a delivery refers to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub language: String,
    pub default_branch: String,
    pub owner_login: String,
}

/// Normalized subset of the account that triggered a delivery
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderInfo {
    pub login: String,
    #[serde(rename = "type")]
    pub sender_type: String,
    pub site_admin: bool,
}

// ============================================================================
// Payloads
// ============================================================================

/// Event payload, strongly shaped for known event types
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Push(PushPayload),
    PullRequest(PullRequestPayload),
    Issues(IssuesPayload),
    IssueComment(IssueCommentPayload),
    Release(ReleasePayload),
    /// Any other event type, kept as its top-level JSON object
    Generic(serde_json::Map<String, serde_json::Value>),
}

impl EventPayload {
    /// Issue or pull request number the payload refers to, if any
    pub fn number(&self) -> Option<u64> {
        match self {
            Self::PullRequest(p) => p.number,
            Self::Issues(p) => p.number,
            Self::IssueComment(p) => p.issue_number,
            Self::Generic(map) => map.get("number").and_then(serde_json::Value::as_u64),
            Self::Push(_) | Self::Release(_) => None,
        }
    }
}

/// Payload of a `push` event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushPayload {
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub commit_count: usize,
    pub forced: bool,
}

/// Payload of a `pull_request` event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestPayload {
    pub number: Option<u64>,
    pub title: String,
    pub state: String,
    pub draft: bool,
    pub merged: bool,
    pub head_ref: String,
    pub base_ref: String,
}

/// Payload of an `issues` event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuesPayload {
    pub number: Option<u64>,
    pub title: String,
    pub state: String,
    pub labels: Vec<String>,
}

/// Payload of an `issue_comment` event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueCommentPayload {
    pub issue_number: Option<u64>,
    pub comment_body: String,
    pub is_pull_request: bool,
}

/// Payload of a `release` event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasePayload {
    pub tag_name: String,
    pub name: String,
    pub draft: bool,
    pub prerelease: bool,
}
