//! Background refresh of the timeline.
//!
//! `start` hands out the `PollHandle` owning the refresh timer; the only way
//! to stop it is to give the handle back to `stop`. Whether a tick fetches is
//! decided by `skip_reason`, which is what keeps at most one timeline request
//! in flight.

use std::time::Duration;

use crate::components::{Action as RootAction, State as RootState};
use crate::store::Effect;
use crate::view_model::{TimelineEvent, TimelinePage};

use super::Action;

/// Id of the task running the current timeline fetch
pub const FETCH_TASK_ID: &str = "timeline-fetch";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollHandle {
    timer_id: String,
    interval: Duration,
}

impl PollHandle {
    pub fn timer_id(&self) -> &str {
        &self.timer_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

pub fn start(generation: u64, interval: Duration) -> (PollHandle, Effect<RootAction>) {
    let handle = PollHandle {
        timer_id: format!("timeline-refresh-{generation}"),
        interval,
    };
    let effect = Effect::timer(
        interval,
        RootAction::Timeline(Action::Tick),
        &handle.timer_id,
    );
    (handle, effect)
}

pub fn stop(handle: PollHandle) -> Effect<RootAction> {
    Effect::cancel(&handle.timer_id)
}

/// Something else is talking to the timeline right now
pub fn busy(state: &RootState) -> bool {
    let timeline = &state.timeline;
    timeline.loading
        || timeline.refreshing
        || state.editor.submitting
        || state.events.mutations_in_flight() > 0
}

/// Why a timer tick must not fetch, if it must not
pub fn skip_reason(state: &RootState) -> Option<&'static str> {
    let timeline = &state.timeline;
    if !timeline.mounted {
        Some("not mounted")
    } else if timeline.error.is_some() {
        Some("previous fetch failed")
    } else if timeline.loading || timeline.refreshing {
        Some("fetch in flight")
    } else if state.editor.submitting {
        Some("comment submission in flight")
    } else if state.events.mutations_in_flight() > 0 {
        Some("comment change in flight")
    } else {
        None
    }
}

/// Why a refreshed timeline makes the request metadata stale
#[derive(Debug, PartialEq)]
pub enum Escalation<'a> {
    /// A status changing log event is among the new events
    StatusEvent(&'a TimelineEvent),
    /// The total grew by more events than the full page can show, any of
    /// them may have changed the status
    HiddenGrowth(u64),
}

impl std::fmt::Display for Escalation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Escalation::StatusEvent(event) => write!(f, "status changing event {}", event.id),
            Escalation::HiddenGrowth(count) => write!(f, "{count} new events off this page"),
        }
    }
}

/// Compares a refreshed page with the one it replaces. Only pages at the
/// same position are compared.
pub fn escalation<'a>(
    previous: Option<&TimelinePage>,
    current: &'a TimelinePage,
) -> Option<Escalation<'a>> {
    let previous = previous?;
    if previous.page != current.page || previous.size != current.size {
        return None;
    }
    let known = previous.ids();
    let new_events: Vec<&TimelineEvent> = current
        .hits
        .iter()
        .filter(|e| !known.contains(&e.id))
        .collect();
    if let Some(event) = new_events.iter().copied().find(|e| e.changes_status()) {
        return Some(Escalation::StatusEvent(event));
    }
    let growth = current.total.saturating_sub(previous.total);
    let visible = new_events.len() as u64;
    // a page with room left shows everything after its offset
    let full = current.hits.len() as u64 >= u64::from(current.size);
    if full && growth > visible {
        return Some(Escalation::HiddenGrowth(growth - visible));
    }
    if growth > 0 {
        log::trace!(
            "timeline grew from {} to {} without status change",
            previous.total,
            current.total
        );
    }
    None
}
