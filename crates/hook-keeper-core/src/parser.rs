//! Maps raw webhook deliveries into normalized [`Event`]s.
//!
//! Known event types get a type-specific extraction routine. Anything else
//! is parsed as a generic JSON object from which `repository`, `sender` and
//! `action` are picked up when present at the top level.

use crate::event::{
    Event, EventPayload, IssueCommentPayload, IssuesPayload, PullRequestPayload, PushPayload,
    ReleasePayload, RepositoryInfo, SenderInfo,
};
use crate::{EventId, Timestamp};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Default prefix of the headers retained on an event
pub const DEFAULT_HEADER_PREFIX: &str = "x-github-";

/// Raw delivery as received by the HTTP surface
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    /// Value of the event-type header
    pub event_type: Option<String>,

    /// Value of the delivery-id header
    pub delivery_id: Option<String>,

    /// All request headers, lower-cased names
    pub headers: HashMap<String, String>,

    pub body: Bytes,
}

impl WebhookDelivery {
    pub fn new(event_type: Option<String>, delivery_id: Option<String>, body: Bytes) -> Self {
        Self {
            event_type,
            delivery_id,
            headers: HashMap::new(),
            body,
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Errors raised while normalizing a delivery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing event type header")]
    MissingEventType,

    #[error("Request body is not a JSON object: {message}")]
    InvalidBody { message: String },

    #[error("Malformed '{event_type}' payload: {message}")]
    InvalidPayload { event_type: String, message: String },
}

/// Stateless delivery normalizer
#[derive(Debug, Clone)]
pub struct EventParser {
    header_prefix: String,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_PREFIX)
    }
}

impl EventParser {
    /// Create a parser retaining headers that start with `header_prefix`
    pub fn new(header_prefix: impl Into<String>) -> Self {
        Self {
            header_prefix: header_prefix.into().to_lowercase(),
        }
    }

    /// Normalize a delivery into an event.
    ///
    /// # Errors
    /// - `ParseError::MissingEventType` if the event type is absent or empty
    /// - `ParseError::InvalidBody` if the body is not a JSON object
    /// - `ParseError::InvalidPayload` if a known event type has a malformed shape
    pub fn parse(&self, delivery: WebhookDelivery) -> Result<Event, ParseError> {
        let event_type = delivery
            .event_type
            .filter(|t| !t.trim().is_empty())
            .ok_or(ParseError::MissingEventType)?;

        let document: Map<String, Value> =
            serde_json::from_slice(&delivery.body).map_err(|e| ParseError::InvalidBody {
                message: e.to_string(),
            })?;

        let id = delivery
            .delivery_id
            .filter(|d| !d.is_empty())
            .map(EventId::new)
            .unwrap_or_else(EventId::generate);

        let invalid = |e: serde_json::Error| ParseError::InvalidPayload {
            event_type: event_type.clone(),
            message: e.to_string(),
        };

        let (action, payload) = match event_type.as_str() {
            "push" => (String::new(), parse_push(&document).map_err(invalid)?),
            "pull_request" => (
                top_level_action(&document),
                parse_pull_request(&document).map_err(invalid)?,
            ),
            "issues" => (
                top_level_action(&document),
                parse_issues(&document).map_err(invalid)?,
            ),
            "issue_comment" => (
                top_level_action(&document),
                parse_issue_comment(&document).map_err(invalid)?,
            ),
            "release" => (
                top_level_action(&document),
                parse_release(&document).map_err(invalid)?,
            ),
            other => {
                debug!(event_type = %other, "No dedicated extractor, using generic payload");
                (top_level_action(&document), EventPayload::Generic(document.clone()))
            }
        };

        let headers = delivery
            .headers
            .into_iter()
            .filter(|(name, _)| name.to_lowercase().starts_with(&self.header_prefix))
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();

        Ok(Event {
            id,
            event_type,
            action,
            repository: extract_repository(&document),
            sender: extract_sender(&document),
            payload,
            raw_payload: delivery.body,
            received_at: Timestamp::now(),
            headers,
        })
    }
}

// ============================================================================
// Common extraction
// ============================================================================

#[derive(Deserialize)]
struct RawOwner {
    login: Option<String>,
}

#[derive(Deserialize)]
struct RawRepository {
    name: Option<String>,
    full_name: Option<String>,
    #[serde(default)]
    private: bool,
    language: Option<String>,
    default_branch: Option<String>,
    owner: Option<RawOwner>,
}

#[derive(Deserialize)]
struct RawSender {
    login: Option<String>,
    #[serde(rename = "type")]
    sender_type: Option<String>,
    #[serde(default)]
    site_admin: bool,
}

fn top_level_action(document: &Map<String, Value>) -> String {
    document
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn extract_repository(document: &Map<String, Value>) -> Option<RepositoryInfo> {
    let raw = RawRepository::deserialize(document.get("repository")?).ok()?;
    let name = raw.name.unwrap_or_default();
    let owner_login = raw.owner.and_then(|o| o.login).unwrap_or_default();
    let full_name = raw.full_name.unwrap_or_else(|| {
        if owner_login.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", owner_login, name)
        }
    });

    Some(RepositoryInfo {
        name,
        full_name,
        private: raw.private,
        language: raw.language.unwrap_or_default(),
        default_branch: raw.default_branch.unwrap_or_default(),
        owner_login,
    })
}

fn extract_sender(document: &Map<String, Value>) -> Option<SenderInfo> {
    let raw = RawSender::deserialize(document.get("sender")?).ok()?;
    Some(SenderInfo {
        login: raw.login.unwrap_or_default(),
        sender_type: raw.sender_type.unwrap_or_default(),
        site_admin: raw.site_admin,
    })
}

/// Deserialize a nested object, treating an absent or null key as empty
fn nested<'a, T>(document: &'a Map<String, Value>, key: &str) -> Result<Option<T>, serde_json::Error>
where
    T: Deserialize<'a>,
{
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value).map(Some),
    }
}

// ============================================================================
// Type-specific extraction
// ============================================================================

#[derive(Deserialize)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    before: Option<String>,
    after: Option<String>,
    #[serde(default)]
    commits: Vec<Value>,
    #[serde(default)]
    forced: bool,
}

fn parse_push(document: &Map<String, Value>) -> Result<EventPayload, serde_json::Error> {
    let raw = RawPush::deserialize(Value::Object(document.clone()))?;
    Ok(EventPayload::Push(PushPayload {
        git_ref: raw.git_ref.unwrap_or_default(),
        before: raw.before.unwrap_or_default(),
        after: raw.after.unwrap_or_default(),
        commit_count: raw.commits.len(),
        forced: raw.forced,
    }))
}

#[derive(Deserialize)]
struct RawBranchRef {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
}

#[derive(Deserialize)]
struct RawPullRequest {
    number: Option<u64>,
    title: Option<String>,
    state: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    merged: bool,
    head: Option<RawBranchRef>,
    base: Option<RawBranchRef>,
}

fn parse_pull_request(document: &Map<String, Value>) -> Result<EventPayload, serde_json::Error> {
    let top_number = document.get("number").and_then(Value::as_u64);
    let payload = match nested::<RawPullRequest>(document, "pull_request")? {
        Some(pr) => PullRequestPayload {
            number: pr.number.or(top_number),
            title: pr.title.unwrap_or_default(),
            state: pr.state.unwrap_or_default(),
            draft: pr.draft,
            merged: pr.merged,
            head_ref: pr.head.and_then(|h| h.git_ref).unwrap_or_default(),
            base_ref: pr.base.and_then(|b| b.git_ref).unwrap_or_default(),
        },
        None => PullRequestPayload {
            number: top_number,
            ..Default::default()
        },
    };
    Ok(EventPayload::PullRequest(payload))
}

#[derive(Deserialize)]
struct RawLabel {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RawIssue {
    number: Option<u64>,
    title: Option<String>,
    state: Option<String>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    pull_request: Option<Value>,
}

fn parse_issues(document: &Map<String, Value>) -> Result<EventPayload, serde_json::Error> {
    let payload = nested::<RawIssue>(document, "issue")?
        .map(|issue| IssuesPayload {
            number: issue.number,
            title: issue.title.unwrap_or_default(),
            state: issue.state.unwrap_or_default(),
            labels: issue.labels.into_iter().filter_map(|l| l.name).collect(),
        })
        .unwrap_or_default();
    Ok(EventPayload::Issues(payload))
}

#[derive(Deserialize)]
struct RawComment {
    body: Option<String>,
}

fn parse_issue_comment(document: &Map<String, Value>) -> Result<EventPayload, serde_json::Error> {
    let issue = nested::<RawIssue>(document, "issue")?;
    let comment = nested::<RawComment>(document, "comment")?;

    Ok(EventPayload::IssueComment(IssueCommentPayload {
        issue_number: issue.as_ref().and_then(|i| i.number),
        comment_body: comment.and_then(|c| c.body).unwrap_or_default(),
        is_pull_request: issue
            .as_ref()
            .is_some_and(|i| i.pull_request.as_ref().is_some_and(|p| !p.is_null())),
    }))
}

#[derive(Deserialize)]
struct RawRelease {
    tag_name: Option<String>,
    name: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
}

fn parse_release(document: &Map<String, Value>) -> Result<EventPayload, serde_json::Error> {
    let payload = nested::<RawRelease>(document, "release")?
        .map(|release| ReleasePayload {
            tag_name: release.tag_name.unwrap_or_default(),
            name: release.name.unwrap_or_default(),
            draft: release.draft,
            prerelease: release.prerelease,
        })
        .unwrap_or_default();
    Ok(EventPayload::Release(payload))
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
