use std::collections::BTreeMap;

use super::error::{Error, Result};
use crate::view_model::{Links, Request, TimelineEvent};

/// Typed access to the hypermedia links of a request.
/// Every accessor fails with `Error::MissingLink` naming the relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLinks {
    links: Links,
}

impl RequestLinks {
    pub fn new(links: Links) -> Self {
        Self { links }
    }

    pub fn from_request(request: &Request) -> Self {
        Self::new(request.links.clone())
    }

    pub fn self_link(&self) -> Result<&str> {
        required(&self.links.self_link, "self")
    }

    pub fn self_html(&self) -> Result<&str> {
        required(&self.links.self_html, "self_html")
    }

    pub fn timeline(&self) -> Result<&str> {
        required(&self.links.timeline, "timeline")
    }

    pub fn comments(&self) -> Result<&str> {
        required(&self.links.comments, "comments")
    }

    pub fn actions(&self) -> Result<&BTreeMap<String, String>> {
        self.links
            .actions
            .as_ref()
            .ok_or_else(|| Error::missing_link("actions"))
    }

    pub fn action(&self, name: &str) -> Result<&str> {
        self.actions()?
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::missing_link(format!("actions.{name}")))
    }
}

/// Links of a single timeline event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLinks {
    links: Links,
}

impl EventLinks {
    pub fn new(links: Links) -> Self {
        Self { links }
    }

    pub fn from_event(event: &TimelineEvent) -> Self {
        Self::new(event.links.clone())
    }

    pub fn event_url(&self) -> Result<&str> {
        required(&self.links.self_link, "self")
    }
}

fn required<'a>(link: &'a Option<String>, relation: &str) -> Result<&'a str> {
    match link.as_deref() {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(Error::missing_link(relation)),
    }
}
