use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{Error, FieldError, Result};
use super::links::{EventLinks, RequestLinks};
use super::types::{Config, RequestSearch, TimelineQuery};
use crate::view_model::{
    Request, RequestList, SearchResponse, TimelineEvent, TimelinePage, TimelineResponse,
};

/// A successful call: the decoded body and the status it came with.
/// Failures carry the same information inside `Error`.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status_code: u16,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T, status_code: u16) -> Self {
        Self { data, status_code }
    }
}

/// Body of a comment create/update, `{"payload": {"content": .., "format": ..}}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub payload: CommentBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentBody {
    pub content: String,
    pub format: String,
}

impl CommentPayload {
    pub fn new(content: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            payload: CommentBody {
                content: content.into(),
                format: format.into(),
            },
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self::new(content, "html")
    }

    /// Body of an action call: the optional comment wrapped as html, or `{}`
    pub fn for_action(comment: Option<&str>) -> serde_json::Value {
        match comment {
            Some(content) if !content.trim().is_empty() => {
                serde_json::to_value(Self::html(content)).unwrap_or_default()
            }
            _ => serde_json::json!({}),
        }
    }
}

/// Everything the client needs from the REST backend.
/// Urls are taken from the links handed in, or for a search from the
/// configured endpoint, never built locally.
#[async_trait]
pub trait RequestsApi: Send + Sync {
    async fn get_request(&self, links: &RequestLinks) -> Result<ApiResponse<Request>>;

    async fn get_timeline(
        &self,
        links: &RequestLinks,
        query: &TimelineQuery,
    ) -> Result<ApiResponse<TimelinePage>>;

    async fn submit_comment(
        &self,
        links: &RequestLinks,
        payload: &CommentPayload,
    ) -> Result<ApiResponse<TimelineEvent>>;

    async fn update_comment(
        &self,
        links: &EventLinks,
        payload: &CommentPayload,
    ) -> Result<ApiResponse<TimelineEvent>>;

    async fn delete_comment(&self, links: &EventLinks) -> Result<ApiResponse<()>>;

    async fn perform_action(
        &self,
        links: &RequestLinks,
        action: &str,
        comment: Option<&str>,
    ) -> Result<ApiResponse<Request>>;

    async fn search_requests(
        &self,
        url: &str,
        search: &RequestSearch,
    ) -> Result<ApiResponse<RequestList>>;
}

#[derive(Clone)]
pub struct Model {
    client: reqwest::Client,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").finish()
    }
}

impl Model {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Config(format!("invalid access token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("could not build http client: {e}")))?;
        Ok(Self { client })
    }

    /// Loads a request from an arbitrary url, used before any links are known
    pub async fn fetch_request_at(&self, url: &str) -> Result<ApiResponse<Request>> {
        let url = parse_url(url)?;
        self.call(
            "fetch_request",
            self.client.request(Method::GET, url),
        )
        .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        call: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>> {
        let (status, body) = self.send(call, builder).await?;
        serde_json::from_slice(&body)
            .map(|data| ApiResponse::new(data, status.as_u16()))
            .map_err(|e| Error::Decode {
                status_code: status.as_u16(),
                message: e.to_string(),
            })
            .api_error(call)
    }

    async fn send(
        &self,
        call: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>)> {
        log::trace!("{call}");
        let response = builder
            .send()
            .await
            .map_err(transport_error)
            .api_error(call)?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(transport_error)
            .api_error(call)?;
        if !status.is_success() {
            let error = status_error(status, &body);
            log::error!("API Error: {call} {error}");
            return Err(error);
        }
        Ok((status, body.to_vec()))
    }
}

#[async_trait]
impl RequestsApi for Model {
    async fn get_request(&self, links: &RequestLinks) -> Result<ApiResponse<Request>> {
        let url = parse_url(links.self_link()?)?;
        self.call("get_request", self.client.get(url)).await
    }

    async fn get_timeline(
        &self,
        links: &RequestLinks,
        query: &TimelineQuery,
    ) -> Result<ApiResponse<TimelinePage>> {
        let url = parse_url(links.timeline()?)?;
        let response: ApiResponse<TimelineResponse> = self
            .call("get_timeline", self.client.get(url).query(query))
            .await?;
        log::trace!(
            "timeline page {} arrived with {} of {} events",
            query.page,
            response.data.hits.hits.len(),
            response.data.hits.total.value()
        );
        Ok(ApiResponse::new(
            response.data.into_page(query),
            response.status_code,
        ))
    }

    async fn submit_comment(
        &self,
        links: &RequestLinks,
        payload: &CommentPayload,
    ) -> Result<ApiResponse<TimelineEvent>> {
        let url = parse_url(links.comments()?)?;
        self.call("submit_comment", self.client.post(url).json(payload))
            .await
    }

    async fn update_comment(
        &self,
        links: &EventLinks,
        payload: &CommentPayload,
    ) -> Result<ApiResponse<TimelineEvent>> {
        let url = parse_url(links.event_url()?)?;
        self.call("update_comment", self.client.put(url).json(payload))
            .await
    }

    async fn delete_comment(&self, links: &EventLinks) -> Result<ApiResponse<()>> {
        let url = parse_url(links.event_url()?)?;
        let (status, _) = self.send("delete_comment", self.client.delete(url)).await?;
        Ok(ApiResponse::new((), status.as_u16()))
    }

    async fn perform_action(
        &self,
        links: &RequestLinks,
        action: &str,
        comment: Option<&str>,
    ) -> Result<ApiResponse<Request>> {
        let url = parse_url(links.action(action)?)?;
        let body = CommentPayload::for_action(comment);
        self.call("perform_action", self.client.post(url).json(&body))
            .await
    }

    async fn search_requests(
        &self,
        url: &str,
        search: &RequestSearch,
    ) -> Result<ApiResponse<RequestList>> {
        let url = parse_url(url)?;
        let response: ApiResponse<SearchResponse<Request>> = self
            .call("search_requests", self.client.get(url).query(search))
            .await?;
        Ok(ApiResponse::new(
            response.data.into_list(search),
            response.status_code,
        ))
    }
}

fn parse_url(url: &str) -> Result<url::Url> {
    url::Url::parse(url).map_err(|e| Error::Transport {
        message: format!("invalid url {url:?}: {e}"),
    })
}

fn transport_error(error: reqwest::Error) -> Error {
    Error::Transport {
        message: error.to_string(),
    }
}

#[derive(Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<FieldError>,
}

fn status_error(status: StatusCode, body: &[u8]) -> Error {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| "Unknown error".to_string());
    Error::HttpStatus {
        status_code: status.as_u16(),
        message,
        errors: parsed.errors,
    }
}

trait ResultExt {
    fn api_error(self, call: &'static str) -> Self;
}

impl<T> ResultExt for Result<T> {
    fn api_error(self, call: &'static str) -> Self {
        if let Err(ref e) = self {
            log::error!("API Error: {call} {e}");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comment_payload_shape() {
        let value = serde_json::to_value(CommentPayload::html("hello")).unwrap();
        assert_eq!(
            value,
            json!({"payload": {"content": "hello", "format": "html"}})
        );
    }

    #[test]
    fn action_body_wraps_only_non_empty_comments() {
        assert_eq!(CommentPayload::for_action(None), json!({}));
        assert_eq!(CommentPayload::for_action(Some("  ")), json!({}));
        assert_eq!(
            CommentPayload::for_action(Some("thanks")),
            json!({"payload": {"content": "thanks", "format": "html"}})
        );
    }

    #[test]
    fn status_errors_use_server_message_and_fields() {
        let body = br#"{"status": 400, "message": "A validation error occurred.",
            "errors": [{"field": "payload.content", "messages": ["Missing data"]}]}"#;
        let error = status_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(error.status_code(), Some(400));
        assert_eq!(error.field_errors().len(), 1);
        assert!(error.to_string().contains("A validation error occurred."));
    }

    #[test]
    fn status_errors_without_body_fall_back_to_reason() {
        let error = status_error(StatusCode::NOT_FOUND, b"<html>nope</html>");
        assert_eq!(
            error,
            Error::HttpStatus {
                status_code: 404,
                message: "Not Found".to_string(),
                errors: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn invalid_search_url_fails_before_any_request() {
        let model = Model::new(&Config::default()).unwrap();
        let result = model
            .search_requests("not a url", &RequestSearch::default())
            .await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[tokio::test]
    async fn missing_links_fail_before_any_request() {
        let model = Model::new(&Config::default()).unwrap();
        let links = RequestLinks::new(Default::default());
        let result = model.get_timeline(&links, &TimelineQuery::default()).await;
        assert_eq!(result, Err(Error::missing_link("timeline")));
    }
}
