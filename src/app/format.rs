//! Plain text rendering of requests and timelines for the terminal.

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::environment::{Error, RequestLinks, RequestSearch};
use crate::helper::html_to_text;
use crate::view_model::{EventKind, Request, RequestList, TimelineEvent, TimelinePage};

fn headline(request: &Request) -> String {
    let number = request
        .number
        .as_deref()
        .map(|n| format!("#{n} "))
        .unwrap_or_default();
    format!(
        "{number}{}",
        request.title.as_deref().unwrap_or("(untitled request)")
    )
}

pub fn format_request(request: &Request) -> String {
    let mut lines = Vec::new();
    lines.push(headline(request));
    lines.push(format!(
        "{} · {}{}",
        request.request_type,
        request.status,
        if request.is_expired { " (expired)" } else { "" }
    ));
    for (label, entity) in [
        ("by", &request.created_by),
        ("to", &request.receiver),
        ("topic", &request.topic),
    ] {
        if let Some(entity) = entity {
            lines.push(format!("{label}: {entity}"));
        }
    }
    if let Some(expires) = request.expires_at {
        lines.push(format!("expires: {}", timestamp(&expires)));
    }
    if let Ok(url) = RequestLinks::from_request(request).self_html() {
        lines.push(format!("web: {url}"));
    }
    let actions = request.available_actions();
    if !actions.is_empty() {
        lines.push(format!("actions: {}", actions.iter().join(", ")));
    }
    lines.join("\n")
}

pub fn format_event(event: &TimelineEvent) -> String {
    let when = event
        .created
        .as_ref()
        .map(timestamp)
        .unwrap_or_else(|| "-".to_string());
    let who = event
        .created_by
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "system".to_string());
    let body = match event.kind() {
        _ if event.is_deleted() => "(deleted)".to_string(),
        EventKind::Comment => {
            let text = event
                .payload
                .as_ref()
                .map(|p| html_to_text(&p.content))
                .unwrap_or_default();
            if event.is_edited() {
                format!("{text} (edited)")
            } else {
                text
            }
        }
        EventKind::Log(kind) => format!("~ {kind}"),
    };
    format!("[{when}] {who} ({}): {body}", event.id)
}

pub fn format_page(page: &TimelinePage) -> String {
    let mut output = page.hits.iter().map(format_event).join("\n");
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(&format!(
        "page {} of {} ({} events)",
        page.page,
        page.total_pages(),
        page.total
    ));
    if !page.is_last_page() {
        output.push_str(&format!(", next: page {}", page.page + 1));
    }
    output
}

pub fn format_request_list(list: &RequestList, search: &RequestSearch) -> String {
    if list.hits.is_empty() {
        return if search.is_open == Some(true) && search.q.is_none() {
            "All done! You've caught up with all open requests.".to_string()
        } else if search.q.is_some() {
            "No requests found! Try again without the search query.".to_string()
        } else {
            "No requests found!".to_string()
        };
    }
    let mut output = list
        .hits
        .iter()
        .map(|request| {
            format!(
                "{} ({}) · {} · {}",
                headline(request),
                request.id,
                request.request_type,
                request.status
            )
        })
        .join("\n");
    output.push_str(&format!(
        "\npage {} of {} ({} requests)",
        list.page,
        list.total_pages(),
        list.total
    ));
    if !list.is_last_page() {
        output.push_str(&format!(", next: page {}", list.page + 1));
    }
    output
}

pub fn format_error(error: &Error) -> String {
    let mut output = error.to_string();
    for field in error.field_errors() {
        output.push_str(&format!("\n  {}: {}", field.field, field.messages.join(", ")));
    }
    output
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}
