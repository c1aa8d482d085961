use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Oldest,
    Newest,
}

/// Query parameters of a timeline fetch
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TimelineQuery {
    pub page: u32,
    pub size: u32,
    pub sort: SortOrder,
}

impl Default for TimelineQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::default(),
        }
    }
}

impl TimelineQuery {
    pub fn with_page(self, page: u32) -> Result<Self> {
        if page == 0 {
            return Err(Error::InvalidQuery("page"));
        }
        Ok(Self { page, ..self })
    }

    pub fn with_size(self, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidQuery("size"));
        }
        Ok(Self { size, ..self })
    }

    pub fn with_sort(self, sort: SortOrder) -> Self {
        Self { sort, ..self }
    }
}

/// Query parameters of a request search. Filters left unset are not sent.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RequestSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    /// `true` for open requests only, `false` for closed ones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
    /// Requests shared with the user instead of the user's own
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub shared_with_me: bool,
    pub page: u32,
    pub size: u32,
}

impl Default for RequestSearch {
    fn default() -> Self {
        Self {
            q: None,
            is_open: None,
            shared_with_me: false,
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RequestSearch {
    pub fn with_query(self, q: Option<String>) -> Self {
        let q = q.filter(|q| !q.trim().is_empty());
        Self { q, ..self }
    }

    pub fn with_open(self, is_open: Option<bool>) -> Self {
        Self { is_open, ..self }
    }

    pub fn shared_with_me(self, shared_with_me: bool) -> Self {
        Self {
            shared_with_me,
            ..self
        }
    }

    pub fn with_page(self, page: u32) -> Result<Self> {
        if page == 0 {
            return Err(Error::InvalidQuery("page"));
        }
        Ok(Self { page, ..self })
    }

    pub fn with_size(self, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidQuery("size"));
        }
        Ok(Self { size, ..self })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub refresh_interval_ms: u64,
    pub page_size: u32,
    pub sort: SortOrder,
    /// Personal access token, sent as a bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
    pub user_agent: String,
    /// Search endpoint listing the user's requests, e.g. `https://host/api/user/requests`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::default(),
            access_token: None,
            request_timeout_ms: None,
            user_agent: format!("requests-feed/{}", env!("CARGO_PKG_VERSION")),
            requests_url: None,
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// The query for the first timeline page, validated against the configured size
    pub fn initial_query(&self) -> Result<TimelineQuery> {
        Ok(TimelineQuery::default()
            .with_size(self.page_size)?
            .with_sort(self.sort))
    }
}
