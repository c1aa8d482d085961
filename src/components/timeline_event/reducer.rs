use crate::components::comment_editor::DEFAULT_FORMAT;
use crate::components::timeline::{self, LocalChange};
use crate::components::{Action as RootAction, State as RootState};
use crate::environment::{CommentPayload, Environment, Error, EventLinks, Result};
use crate::store::Effect;
use crate::view_model::{EventId, TimelineEvent};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventState {
    pub editing: bool,
    pub loading: bool,
    pub error: Option<Error>,
}

impl EventState {
    fn is_idle(&self) -> bool {
        !self.editing && !self.loading && self.error.is_none()
    }
}

/// Per event UI state. Events without an entry are idle.
#[derive(Clone, Debug, Default)]
pub struct State {
    events: im::HashMap<EventId, EventState>,
    finished: u64,
}

impl State {
    pub fn get(&self, id: &EventId) -> EventState {
        self.events.get(id).cloned().unwrap_or_default()
    }

    /// Updates and deletes that have not come back yet
    pub fn mutations_in_flight(&self) -> usize {
        self.events.values().filter(|e| e.loading).count()
    }

    /// Updates and deletes that came back, successful or not
    pub fn finished(&self) -> u64 {
        self.finished
    }

    fn update(&mut self, id: &EventId, change: impl FnOnce(&mut EventState)) {
        let mut entry = self.get(id);
        change(&mut entry);
        if entry.is_idle() {
            self.events.remove(id);
        } else {
            self.events.insert(id.clone(), entry);
        }
    }
}

#[derive(Clone, Debug)]
pub enum Action {
    ToggleEdit(EventId),
    Update {
        id: EventId,
        content: String,
        format: Option<String>,
    },
    Updated(EventId, Result<TimelineEvent>),
    Delete(EventId),
    Deleted(EventId, Result<()>),
}

pub fn reduce(
    action: Action,
    state: &mut RootState,
    environment: &Environment,
) -> Effect<RootAction> {
    match action {
        Action::ToggleEdit(id) => {
            state.events.update(&id, |entry| {
                entry.editing = !entry.editing;
                entry.error = None;
            });
            Effect::NONE
        }
        Action::Update {
            id,
            content,
            format,
        } => {
            let links = match mutation_links(state, &id) {
                Ok(links) => links,
                Err(error) => return fail(state, &id, error),
            };
            if content.trim().is_empty() {
                return fail(state, &id, Error::EmptyComment);
            }
            state.events.update(&id, |entry| {
                entry.loading = true;
                entry.error = None;
            });
            let payload = CommentPayload::new(
                content,
                format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            );
            let api = environment.api.clone();
            Effect::future(
                async move {
                    api.update_comment(&links, &payload)
                        .await
                        .map(|response| response.data)
                },
                move |result| RootAction::Event(Action::Updated(id, result)),
            )
        }
        Action::Updated(id, result) => {
            state.events.finished += 1;
            match result {
                Ok(event) => {
                    state.events.update(&id, |entry| {
                        entry.loading = false;
                        entry.editing = false;
                    });
                    timeline::apply_local(&mut state.timeline, LocalChange::Updated(event));
                }
                Err(error) => {
                    log::error!("updating comment {id} failed: {error}");
                    state.events.update(&id, |entry| {
                        entry.loading = false;
                        entry.error = Some(error);
                    });
                }
            }
            timeline::settle(state, environment)
        }
        Action::Delete(id) => {
            let links = match mutation_links(state, &id) {
                Ok(links) => links,
                Err(error) => return fail(state, &id, error),
            };
            state.events.update(&id, |entry| {
                entry.loading = true;
                entry.error = None;
            });
            let api = environment.api.clone();
            Effect::future(
                async move { api.delete_comment(&links).await.map(|_| ()) },
                move |result| RootAction::Event(Action::Deleted(id, result)),
            )
        }
        Action::Deleted(id, result) => {
            state.events.finished += 1;
            match result {
                Ok(()) => {
                    state.events.update(&id, |entry| {
                        entry.loading = false;
                        entry.editing = false;
                    });
                    timeline::apply_local(&mut state.timeline, LocalChange::Deleted(id));
                }
                Err(error) => {
                    log::error!("deleting comment {id} failed: {error}");
                    state.events.update(&id, |entry| {
                        entry.loading = false;
                        entry.error = Some(error);
                    });
                }
            }
            timeline::settle(state, environment)
        }
    }
}

/// The event's own link, if it is on the current page and not already busy
fn mutation_links(state: &RootState, id: &EventId) -> Result<EventLinks> {
    if state.events.get(id).loading {
        return Err(Error::Busy);
    }
    let event = state
        .timeline
        .page
        .as_ref()
        .and_then(|page| page.get(id))
        .ok_or_else(|| Error::ReconciliationMiss(id.clone()))?;
    let links = EventLinks::from_event(event);
    links.event_url()?;
    Ok(links)
}

fn fail(state: &mut RootState, id: &EventId, error: Error) -> Effect<RootAction> {
    log::warn!("cannot change comment {id}: {error}");
    if error != Error::Busy {
        state.events.update(id, |entry| entry.error = Some(error));
    }
    Effect::NONE
}
