//! Applies a single known local change to the held timeline page.
//!
//! Every function leaves the page it was given untouched and returns a new
//! one. Unchanged events are shared between the two, only the targeted hit
//! differs, so snapshot consumers can tell old and new apart cheaply.

use crate::environment::{Error, Result};
use crate::view_model::{EventId, TimelineEvent, TimelinePage};

/// Appends a freshly created event. Total and pagination stay as they are;
/// the next refresh brings the authoritative numbers.
pub fn apply_create(event: TimelineEvent, page: &TimelinePage) -> TimelinePage {
    let mut next = page.clone();
    match next.position(&event.id) {
        // a refresh may already have brought it in
        Some(index) => {
            next.hits.set(index, event);
        }
        None => next.hits.push_back(event),
    }
    next
}

/// Replaces the event with the same id in place
pub fn apply_update(event: TimelineEvent, page: &TimelinePage) -> Result<TimelinePage> {
    let index = page
        .position(&event.id)
        .ok_or_else(|| Error::ReconciliationMiss(event.id.clone()))?;
    let mut next = page.clone();
    next.hits.set(index, event);
    Ok(next)
}

/// Turns the event into a tombstone: it keeps its place, only the payload goes
pub fn apply_delete(id: &EventId, page: &TimelinePage) -> Result<TimelinePage> {
    let index = page
        .position(id)
        .ok_or_else(|| Error::ReconciliationMiss(id.clone()))?;
    let mut next = page.clone();
    if let Some(event) = next.hits.get_mut(index) {
        event.payload = None;
    }
    Ok(next)
}
