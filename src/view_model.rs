use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::environment::types::{RequestSearch, TimelineQuery};
use crate::helper::timestamp;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        EventId(value.to_string())
    }
}

/// Hypermedia links of a request or an event. Events only carry `self`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<BTreeMap<String, String>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
    Created,
    Submitted,
    Accepted,
    Declined,
    Cancelled,
    Expired,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl RequestStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, RequestStatus::Submitted)
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            RequestStatus::Accepted
                | RequestStatus::Declined
                | RequestStatus::Cancelled
                | RequestStatus::Expired
        )
    }
}

/// Request types are extensible on the server, so unknown ids are kept verbatim
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Submission,
    Invitation,
    Inclusion,
    AccessRequest,
    Other(String),
}

impl RequestType {
    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Submission => "community-submission",
            RequestType::Invitation => "community-invitation",
            RequestType::Inclusion => "community-inclusion",
            RequestType::AccessRequest => "user-access-request",
            RequestType::Other(other) => other,
        }
    }
}

impl From<String> for RequestType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "community-submission" => RequestType::Submission,
            "community-invitation" => RequestType::Invitation,
            "community-inclusion" => RequestType::Inclusion,
            "user-access-request" | "guest-access-request" | "access-request" => {
                RequestType::AccessRequest
            }
            _ => RequestType::Other(value),
        }
    }
}

impl From<RequestType> for String {
    fn from(value: RequestType) -> Self {
        match value {
            RequestType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a user, community, group, email address or record.
///
/// On the wire this is a single key object such as `{"user": "1"}`. The
/// deserializer decides the variant; nothing downstream inspects keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, serde_json::Value>", into = "BTreeMap<String, String>")]
pub enum EntityReference {
    User(String),
    Community(String),
    Group(String),
    Email(String),
    Record(String),
    Other { kind: String, id: String },
}

impl EntityReference {
    pub fn kind(&self) -> &str {
        match self {
            EntityReference::User(_) => "user",
            EntityReference::Community(_) => "community",
            EntityReference::Group(_) => "group",
            EntityReference::Email(_) => "email",
            EntityReference::Record(_) => "record",
            EntityReference::Other { kind, .. } => kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityReference::User(id)
            | EntityReference::Community(id)
            | EntityReference::Group(id)
            | EntityReference::Email(id)
            | EntityReference::Record(id) => id,
            EntityReference::Other { id, .. } => id,
        }
    }
}

impl From<BTreeMap<String, serde_json::Value>> for EntityReference {
    fn from(value: BTreeMap<String, serde_json::Value>) -> Self {
        let Some((kind, id)) = value.into_iter().next() else {
            return EntityReference::Other {
                kind: String::new(),
                id: String::new(),
            };
        };
        let id = match id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        match kind.as_str() {
            "user" => EntityReference::User(id),
            "community" => EntityReference::Community(id),
            "group" => EntityReference::Group(id),
            "email" => EntityReference::Email(id),
            "record" => EntityReference::Record(id),
            _ => EntityReference::Other { kind, id },
        }
    }
}

impl From<EntityReference> for BTreeMap<String, String> {
    fn from(value: EntityReference) -> Self {
        let mut map = BTreeMap::new();
        map.insert(value.kind().to_string(), value.id().to_string());
        map
    }
}

impl std::fmt::Display for EntityReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub status: RequestStatus,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<EntityReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<EntityReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<EntityReference>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub revision_id: u64,
}

impl Request {
    /// Names of the actions the current user may perform, as advertised by the server
    pub fn available_actions(&self) -> Vec<&str> {
        self.links
            .actions
            .as_ref()
            .map(|actions| actions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "C", alias = "comment")]
    Comment,
    #[serde(rename = "L", alias = "log")]
    Log,
}

/// What a log event records. Parsed from the `event` field of the payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LogEventKind {
    Accepted,
    Declined,
    Cancelled,
    Expired,
    Submitted,
    CommentDeleted,
    Unknown,
}

impl LogEventKind {
    /// Log kinds that imply the request itself changed status
    pub fn changes_status(&self) -> bool {
        matches!(
            self,
            LogEventKind::Accepted
                | LogEventKind::Declined
                | LogEventKind::Cancelled
                | LogEventKind::Expired
                | LogEventKind::Submitted
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Comment,
    Log(LogEventKind),
}

fn default_format() -> String {
    "html".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPermissions {
    #[serde(default)]
    pub can_update_comment: bool,
    #[serde(default)]
    pub can_delete_comment: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// `None` once a comment was deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<EntityReference>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revision_id: u64,
    #[serde(default)]
    pub permissions: EventPermissions,
    #[serde(default)]
    pub links: Links,
}

impl TimelineEvent {
    pub fn kind(&self) -> EventKind {
        match self.event_type {
            EventType::Comment => EventKind::Comment,
            EventType::Log => EventKind::Log(
                self.payload
                    .as_ref()
                    .and_then(|p| p.event.as_deref())
                    .and_then(|e| e.parse().ok())
                    .unwrap_or(LogEventKind::Unknown),
            ),
        }
    }

    pub fn is_edited(&self) -> bool {
        self.revision_id > 1
    }

    pub fn is_deleted(&self) -> bool {
        self.payload.is_none()
    }

    pub fn changes_status(&self) -> bool {
        matches!(self.kind(), EventKind::Log(kind) if kind.changes_status())
    }
}

/// One page of the timeline as held by the client.
///
/// `hits` is a persistent vector: cloning a page is cheap and a patched copy
/// shares every untouched event with the page it was derived from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelinePage {
    pub hits: im::Vector<TimelineEvent>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

impl TimelinePage {
    pub fn new(hits: impl IntoIterator<Item = TimelineEvent>, total: u64, query: &TimelineQuery) -> Self {
        Self {
            hits: hits.into_iter().collect(),
            total,
            page: query.page,
            size: query.size,
        }
    }

    pub fn is_last_page(&self) -> bool {
        u64::from(self.page) * u64::from(self.size) >= self.total
    }

    pub fn total_pages(&self) -> u32 {
        page_count(self.total, self.size)
    }

    pub fn position(&self, id: &EventId) -> Option<usize> {
        self.hits.iter().position(|event| &event.id == id)
    }

    pub fn get(&self, id: &EventId) -> Option<&TimelineEvent> {
        self.hits.iter().find(|event| &event.id == id)
    }

    pub fn ids(&self) -> HashSet<&EventId> {
        self.hits.iter().map(|event| &event.id).collect()
    }
}

/// Pages needed for `total` items, at least one
pub fn page_count(total: u64, size: u32) -> u32 {
    if size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(size)).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// One page of a request search
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestList {
    pub hits: im::Vector<Request>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

impl RequestList {
    pub fn total_pages(&self) -> u32 {
        page_count(self.total, self.size)
    }

    pub fn is_last_page(&self) -> bool {
        u64::from(self.page) * u64::from(self.size) >= self.total
    }
}

/// Wire shape of a search response, `{"hits": {"hits": [..], "total": ..}}`
#[derive(Debug, Deserialize)]
pub struct SearchResponse<T> {
    pub hits: SearchHits<T>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHits<T> {
    #[serde(default = "Vec::new")]
    pub hits: Vec<T>,
    pub total: HitsTotal,
}

/// Wire shape of `GET timeline`
pub type TimelineResponse = SearchResponse<TimelineEvent>;

/// Search backends report the total either as a number or as `{"value": n}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HitsTotal {
    Count(u64),
    Object { value: u64 },
}

impl HitsTotal {
    pub fn value(&self) -> u64 {
        match self {
            HitsTotal::Count(v) | HitsTotal::Object { value: v } => *v,
        }
    }
}

impl SearchResponse<TimelineEvent> {
    pub fn into_page(self, query: &TimelineQuery) -> TimelinePage {
        let total = self.hits.total.value();
        TimelinePage::new(self.hits.hits, total, query)
    }
}

impl SearchResponse<Request> {
    pub fn into_list(self, search: &RequestSearch) -> RequestList {
        RequestList {
            total: self.hits.total.value(),
            hits: self.hits.hits.into_iter().collect(),
            page: search.page,
            size: search.size,
        }
    }
}
