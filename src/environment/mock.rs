//! In-memory backend and fixtures for tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::error::{Error, Result};
use super::links::{EventLinks, RequestLinks};
use super::model::{ApiResponse, CommentPayload, RequestsApi};
use super::types::{RequestSearch, TimelineQuery};
use crate::view_model::*;

pub const REQUEST_URL: &str = "https://repo.example/api/requests/r1";

pub fn make_request() -> Request {
    Request {
        id: RequestId("r1".to_string()),
        number: Some("1".to_string()),
        title: Some("Include record".to_string()),
        description: None,
        request_type: RequestType::Inclusion,
        status: RequestStatus::Submitted,
        is_open: true,
        is_expired: false,
        created_by: Some(EntityReference::User("1".to_string())),
        receiver: Some(EntityReference::Community("c1".to_string())),
        topic: Some(EntityReference::Record("rec-1".to_string())),
        expires_at: None,
        created: None,
        updated: None,
        links: Links {
            self_link: Some(REQUEST_URL.to_string()),
            self_html: Some("https://repo.example/requests/r1".to_string()),
            timeline: Some(format!("{REQUEST_URL}/timeline")),
            comments: Some(format!("{REQUEST_URL}/comments")),
            actions: Some(BTreeMap::from([
                ("accept".to_string(), format!("{REQUEST_URL}/actions/accept")),
                ("decline".to_string(), format!("{REQUEST_URL}/actions/decline")),
            ])),
        },
        revision_id: 1,
    }
}

pub fn event_url(id: &str) -> String {
    format!("{REQUEST_URL}/events/{id}")
}

pub fn make_comment(id: &str, content: &str) -> TimelineEvent {
    TimelineEvent {
        id: EventId(id.to_string()),
        event_type: EventType::Comment,
        payload: Some(EventPayload {
            content: content.to_string(),
            format: "html".to_string(),
            event: None,
        }),
        created_by: Some(EntityReference::User("1".to_string())),
        created: None,
        updated: None,
        revision_id: 1,
        permissions: EventPermissions {
            can_update_comment: true,
            can_delete_comment: true,
        },
        links: Links {
            self_link: Some(event_url(id)),
            ..Default::default()
        },
    }
}

pub fn make_log(id: &str, kind: LogEventKind) -> TimelineEvent {
    let kind: &'static str = kind.into();
    TimelineEvent {
        id: EventId(id.to_string()),
        event_type: EventType::Log,
        payload: Some(EventPayload {
            content: String::new(),
            format: "html".to_string(),
            event: Some(kind.to_string()),
        }),
        permissions: EventPermissions::default(),
        ..make_comment(id, "")
    }
}

pub fn make_page(events: Vec<TimelineEvent>) -> TimelinePage {
    let total = events.len() as u64;
    TimelinePage::new(events, total, &TimelineQuery::default())
}

/// Comments `c0..cN` as a single page
pub fn make_comments_page(count: usize) -> TimelinePage {
    make_page(
        (0..count)
            .map(|i| make_comment(&format!("c{i}"), &format!("comment {i}")))
            .collect(),
    )
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    GetRequest,
    GetTimeline(TimelineQuery),
    SubmitComment {
        url: String,
        payload: CommentPayload,
    },
    UpdateComment {
        url: String,
        payload: CommentPayload,
    },
    DeleteComment {
        url: String,
    },
    PerformAction {
        url: String,
        body: serde_json::Value,
    },
    SearchRequests {
        url: String,
        search: RequestSearch,
    },
}

/// Scripted backend. Timeline responses are consumed front to back; the
/// last one keeps being served.
pub struct MockApi {
    request: Mutex<Request>,
    timeline: Mutex<VecDeque<Result<TimelinePage>>>,
    comment_result: Mutex<Option<Result<TimelineEvent>>>,
    update_result: Mutex<Option<Result<TimelineEvent>>>,
    delete_result: Mutex<Result<()>>,
    action_result: Mutex<Option<Result<Request>>>,
    search_results: Mutex<Vec<Request>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    created: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new(make_request(), make_comments_page(0))
    }
}

impl MockApi {
    pub fn new(request: Request, page: TimelinePage) -> Self {
        Self {
            request: Mutex::new(request),
            timeline: Mutex::new(VecDeque::from([Ok(page)])),
            comment_result: Mutex::new(None),
            update_result: Mutex::new(None),
            delete_result: Mutex::new(Ok(())),
            action_result: Mutex::new(None),
            search_results: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Replaces all scripted timeline responses
    pub fn set_timeline(&self, responses: Vec<Result<TimelinePage>>) {
        *self.timeline.lock().unwrap() = responses.into();
    }

    pub fn set_request(&self, request: Request) {
        *self.request.lock().unwrap() = request;
    }

    pub fn set_comment_result(&self, result: Result<TimelineEvent>) {
        *self.comment_result.lock().unwrap() = Some(result);
    }

    pub fn set_update_result(&self, result: Result<TimelineEvent>) {
        *self.update_result.lock().unwrap() = Some(result);
    }

    pub fn set_delete_result(&self, result: Result<()>) {
        *self.delete_result.lock().unwrap() = result;
    }

    pub fn set_action_result(&self, result: Result<Request>) {
        *self.action_result.lock().unwrap() = Some(result);
    }

    /// Requests a search can find, filtered by `is_open` and the title
    pub fn set_search_results(&self, requests: Vec<Request>) {
        *self.search_results.lock().unwrap() = requests;
    }

    /// Timeline fetches block until `release_timeline` hands out permits
    pub fn hold_timeline(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_timeline(&self, fetches: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(fetches);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn timeline_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::GetTimeline(_)))
    }

    pub fn request_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::GetRequest))
    }

    pub fn count(&self, filter: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| filter(c)).count()
    }

    pub fn max_concurrent_timeline_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn timeline_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_timeline(&self) -> Result<TimelinePage> {
        let mut responses = self.timeline.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap_or_else(|| Ok(TimelinePage::default()))
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(TimelinePage::default()))
        }
    }
}

#[async_trait]
impl RequestsApi for MockApi {
    async fn get_request(&self, links: &RequestLinks) -> Result<ApiResponse<Request>> {
        links.self_link()?;
        self.record(Call::GetRequest);
        let request = self.request.lock().unwrap().clone();
        Ok(ApiResponse::new(request, 200))
    }

    async fn get_timeline(
        &self,
        links: &RequestLinks,
        query: &TimelineQuery,
    ) -> Result<ApiResponse<TimelinePage>> {
        links.timeline()?;
        self.record(Call::GetTimeline(*query));
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        // aborted fetches are dropped mid-await and must still count as finished
        let _in_flight = InFlight(&self.in_flight);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let result = self.next_timeline().map(|mut page| {
            page.page = query.page;
            page.size = query.size;
            ApiResponse::new(page, 200)
        });
        result
    }

    async fn submit_comment(
        &self,
        links: &RequestLinks,
        payload: &CommentPayload,
    ) -> Result<ApiResponse<TimelineEvent>> {
        let url = links.comments()?.to_string();
        self.record(Call::SubmitComment {
            url,
            payload: payload.clone(),
        });
        let scripted = self.comment_result.lock().unwrap().clone();
        let event = match scripted {
            Some(result) => result?,
            None => {
                let n = self.created.fetch_add(1, Ordering::SeqCst);
                make_comment(&format!("new-{n}"), &payload.payload.content)
            }
        };
        Ok(ApiResponse::new(event, 201))
    }

    async fn update_comment(
        &self,
        links: &EventLinks,
        payload: &CommentPayload,
    ) -> Result<ApiResponse<TimelineEvent>> {
        let url = links.event_url()?.to_string();
        self.record(Call::UpdateComment {
            url: url.clone(),
            payload: payload.clone(),
        });
        let scripted = self.update_result.lock().unwrap().clone();
        let event = match scripted {
            Some(result) => result?,
            None => {
                let id = url.rsplit('/').next().unwrap_or_default();
                let mut event = make_comment(id, &payload.payload.content);
                event.revision_id = 2;
                event
            }
        };
        Ok(ApiResponse::new(event, 200))
    }

    async fn delete_comment(&self, links: &EventLinks) -> Result<ApiResponse<()>> {
        let url = links.event_url()?.to_string();
        self.record(Call::DeleteComment { url });
        self.delete_result.lock().unwrap().clone()?;
        Ok(ApiResponse::new((), 204))
    }

    async fn perform_action(
        &self,
        links: &RequestLinks,
        action: &str,
        comment: Option<&str>,
    ) -> Result<ApiResponse<Request>> {
        let url = links.action(action)?.to_string();
        self.record(Call::PerformAction {
            url,
            body: CommentPayload::for_action(comment),
        });
        let scripted = self.action_result.lock().unwrap().clone();
        let request = match scripted {
            Some(result) => result?,
            None => {
                let mut request = self.request.lock().unwrap().clone();
                request.status = match action {
                    "accept" => RequestStatus::Accepted,
                    "decline" => RequestStatus::Declined,
                    "cancel" => RequestStatus::Cancelled,
                    _ => request.status,
                };
                request.revision_id += 1;
                request
            }
        };
        Ok(ApiResponse::new(request, 200))
    }

    async fn search_requests(
        &self,
        url: &str,
        search: &RequestSearch,
    ) -> Result<ApiResponse<RequestList>> {
        self.record(Call::SearchRequests {
            url: url.to_string(),
            search: search.clone(),
        });
        let matching: Vec<Request> = self
            .search_results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| search.is_open.map_or(true, |open| r.is_open == open))
            .filter(|r| {
                search.q.as_deref().map_or(true, |q| {
                    r.title.as_deref().unwrap_or_default().contains(q)
                })
            })
            .cloned()
            .collect();
        let skip = (search.page as usize - 1) * search.size as usize;
        let list = RequestList {
            total: matching.len() as u64,
            hits: matching.into_iter().skip(skip).take(search.size as usize).collect(),
            page: search.page,
            size: search.size,
        };
        Ok(ApiResponse::new(list, 200))
    }
}

pub fn make_closed_request(id: &str, title: &str) -> Request {
    Request {
        id: RequestId(id.to_string()),
        title: Some(title.to_string()),
        status: RequestStatus::Accepted,
        is_open: false,
        ..make_request()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn server_error() -> Error {
    Error::HttpStatus {
        status_code: 500,
        message: "Internal Server Error".to_string(),
        errors: Vec::new(),
    }
}
