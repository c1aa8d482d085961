use std::time::Duration;

use super::poller::{self, PollHandle, FETCH_TASK_ID};
use super::reconcile::{apply_create, apply_delete, apply_update};
use crate::components::{request, Action as RootAction, State as RootState};
use crate::environment::{Config, Environment, Error, RequestLinks, Result, TimelineQuery};
use crate::store::Effect;
use crate::view_model::{EventId, TimelineEvent, TimelinePage};

#[derive(Clone, Debug)]
pub struct State {
    pub page: Option<TimelinePage>,
    pub query: TimelineQuery,
    /// Blocking fetch, nothing useful to show yet
    pub loading: bool,
    /// Any fetch in flight, blocking or not
    pub refreshing: bool,
    pub error: Option<Error>,
    pub mounted: bool,
    /// Bumped on every mount and unmount
    pub generation: u64,
    /// Bumped whenever a local change is applied to `page`
    pub local_revision: u64,
    /// A manual fetch arrived while busy and still has to be issued
    pub refetch_pending: bool,
    pub poll: Option<PollHandle>,
    refresh_interval: Duration,
}

impl State {
    pub fn new(config: &Config) -> Self {
        let query = config.initial_query().unwrap_or_else(|error| {
            log::warn!("{error}, falling back to the default timeline query");
            TimelineQuery::default()
        });
        Self {
            page: None,
            query,
            loading: false,
            refreshing: false,
            error: None,
            mounted: false,
            generation: 0,
            local_revision: 0,
            refetch_pending: false,
            poll: None,
            refresh_interval: config.refresh_interval(),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn events(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.page.iter().flat_map(|page| page.hits.iter())
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            query: self.query,
            local_revision: self.local_revision,
        }
    }
}

/// What a fetch was issued for. A completion is only applied if its ticket
/// still matches the slice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub query: TimelineQuery,
    pub local_revision: u64,
}

#[derive(Clone)]
pub enum Action {
    Mount,
    Unmount,
    Tick,
    Refresh,
    Retry,
    ChangePage(u32),
    Loaded(Ticket, Result<TimelinePage>),
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mount => write!(f, "Mount"),
            Self::Unmount => write!(f, "Unmount"),
            Self::Tick => write!(f, "Tick"),
            Self::Refresh => write!(f, "Refresh"),
            Self::Retry => write!(f, "Retry"),
            Self::ChangePage(page) => f.debug_tuple("ChangePage").field(page).finish(),
            Self::Loaded(ticket, Ok(page)) => f
                .debug_tuple("Loaded")
                .field(ticket)
                .field(&page.hits.len())
                .finish(),
            Self::Loaded(ticket, Err(error)) => {
                f.debug_tuple("Loaded").field(ticket).field(error).finish()
            }
        }
    }
}

/// A change the client made itself and already knows the result of
#[derive(Clone, Debug)]
pub enum LocalChange {
    Created(TimelineEvent),
    Updated(TimelineEvent),
    Deleted(EventId),
}

pub fn reduce(
    action: Action,
    state: &mut RootState,
    environment: &Environment,
) -> Effect<RootAction> {
    match action {
        Action::Mount => {
            let previous = state.timeline.poll.take().map(poller::stop);
            let timeline = &mut state.timeline;
            timeline.generation += 1;
            timeline.mounted = true;
            timeline.error = None;
            timeline.refetch_pending = false;
            // a fetch of an older mount is replaced by the one below
            timeline.loading = false;
            timeline.refreshing = false;
            let (handle, timer) = poller::start(timeline.generation, timeline.refresh_interval);
            timeline.poll = Some(handle);
            Effect::merge3(
                previous.unwrap_or(Effect::NONE),
                fetch(state, environment, true),
                timer,
            )
        }
        Action::Unmount => {
            let timeline = &mut state.timeline;
            if !timeline.mounted {
                return Effect::NONE;
            }
            timeline.mounted = false;
            timeline.generation += 1;
            timeline.loading = false;
            timeline.refreshing = false;
            timeline.refetch_pending = false;
            let stop = timeline.poll.take().map(poller::stop);
            Effect::merge2(stop.unwrap_or(Effect::NONE), Effect::cancel(FETCH_TASK_ID))
        }
        Action::Tick => {
            if let Some(reason) = poller::skip_reason(state) {
                log::debug!("skipping timeline refresh: {reason}");
                return Effect::NONE;
            }
            fetch(state, environment, false)
        }
        Action::Refresh => request_fetch(state, environment),
        Action::Retry => {
            state.timeline.error = None;
            request_fetch(state, environment)
        }
        Action::ChangePage(page) => {
            let query = match state.timeline.query.with_page(page) {
                Ok(query) => query,
                Err(error) => {
                    log::warn!("ignoring page change: {error}");
                    return Effect::NONE;
                }
            };
            state.timeline.query = query;
            request_fetch(state, environment)
        }
        Action::Loaded(ticket, result) => {
            let timeline = &mut state.timeline;
            if !timeline.mounted || ticket.generation != timeline.generation {
                log::debug!("discarding timeline of generation {}", ticket.generation);
                return Effect::NONE;
            }
            timeline.loading = false;
            timeline.refreshing = false;
            if ticket.query != timeline.query {
                log::debug!("timeline query changed while fetching");
                timeline.refetch_pending = true;
                return settle(state, environment);
            }
            let page = match result {
                Ok(page) => page,
                Err(error) => {
                    log::error!("timeline fetch failed: {error}");
                    if timeline.refetch_pending {
                        // a trigger queued during the failed fetch is its retry
                        log::debug!("issuing the refetch queued during the failed fetch");
                        return settle(state, environment);
                    }
                    timeline.error = Some(error);
                    return Effect::NONE;
                }
            };
            if ticket.local_revision != timeline.local_revision {
                log::debug!("timeline changed locally while fetching");
                timeline.refetch_pending = true;
                return settle(state, environment);
            }
            timeline.error = None;
            let previous = timeline.page.replace(page);
            let escalate = match timeline.page.as_ref() {
                Some(current) => poller::escalation(previous.as_ref(), current).map(|reason| {
                    log::debug!("{reason}, reloading request");
                    Effect::action(RootAction::Request(request::Action::Reload))
                }),
                None => None,
            };
            Effect::merge2(escalate.unwrap_or(Effect::NONE), settle(state, environment))
        }
    }
}

/// Fetches now, or once the timeline is no longer busy. Clears a previous
/// error as an explicit trigger counts as a retry.
pub fn request_fetch(state: &mut RootState, environment: &Environment) -> Effect<RootAction> {
    if !state.timeline.mounted {
        return Effect::NONE;
    }
    state.timeline.error = None;
    if poller::busy(state) {
        log::debug!("timeline busy, queueing refetch");
        state.timeline.refetch_pending = true;
        return Effect::NONE;
    }
    let blocking = state.timeline.page.is_none();
    fetch(state, environment, blocking)
}

/// Issues the queued refetch if nothing else is running anymore. Called
/// whenever a fetch or mutation finishes.
pub fn settle(state: &mut RootState, environment: &Environment) -> Effect<RootAction> {
    if !state.timeline.mounted || !state.timeline.refetch_pending || poller::busy(state) {
        return Effect::NONE;
    }
    state.timeline.refetch_pending = false;
    let blocking = state.timeline.page.is_none();
    fetch(state, environment, blocking)
}

/// Patches the held page. A miss is not an error for the user: the next
/// refresh brings the server's view.
pub fn apply_local(timeline: &mut State, change: LocalChange) {
    let Some(page) = timeline.page.as_ref() else {
        log::debug!("no timeline page yet, dropping {change:?}");
        timeline.refetch_pending = true;
        return;
    };
    let next = match change {
        LocalChange::Created(event) => Ok(apply_create(event, page)),
        LocalChange::Updated(event) => apply_update(event, page),
        LocalChange::Deleted(id) => apply_delete(&id, page),
    };
    match next {
        Ok(next) => {
            timeline.page = Some(next);
            timeline.local_revision += 1;
        }
        Err(error) => log::debug!("{error}, waiting for the next refresh"),
    }
}

fn fetch(state: &mut RootState, environment: &Environment, blocking: bool) -> Effect<RootAction> {
    let links = RequestLinks::from_request(&state.request.request);
    let timeline = &mut state.timeline;
    if let Err(error) = links.timeline() {
        log::error!("cannot load timeline: {error}");
        timeline.error = Some(error);
        timeline.loading = false;
        timeline.refreshing = false;
        return Effect::NONE;
    }
    timeline.loading = blocking;
    timeline.refreshing = true;
    let ticket = timeline.ticket();
    let api = environment.api.clone();
    Effect::cancellable(
        async move {
            api.get_timeline(&links, &ticket.query)
                .await
                .map(|response| response.data)
        },
        move |result| RootAction::Timeline(Action::Loaded(ticket, result)),
        FETCH_TASK_ID,
    )
}
