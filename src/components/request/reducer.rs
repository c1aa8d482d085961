use crate::components::timeline;
use crate::components::{Action as RootAction, State as RootState};
use crate::environment::{Environment, Error, RequestLinks, Result};
use crate::store::Effect;
use crate::view_model::Request;

#[derive(Clone, Debug)]
pub struct State {
    pub request: Request,
    /// Reloading the metadata
    pub loading: bool,
    pub error: Option<Error>,
    pub action: ActionState,
    /// Bumped whenever `request` is replaced by something newer than a
    /// reload in flight could bring back
    pub generation: u64,
    initial: Request,
}

impl State {
    pub fn new(request: Request) -> Self {
        Self {
            initial: request.clone(),
            request,
            loading: false,
            error: None,
            action: ActionState::default(),
            generation: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ActionState {
    pub loading: bool,
    /// Name of the action currently being performed
    pub in_flight: Option<String>,
    pub error: Option<Error>,
    /// Actions whose confirmation is showing
    pub open_modals: im::OrdSet<String>,
    /// Performed actions that came back, successful or not
    pub finished: u64,
}

#[derive(Clone, Debug)]
pub enum Action {
    /// Replaces the request, or goes back to the one the page was opened with
    Init(Option<Request>),
    Reload,
    /// Reply to the reload issued at the given generation
    Loaded(u64, Result<Request>),
    ToggleModal {
        name: String,
        open: bool,
    },
    Perform {
        name: String,
        comment: Option<String>,
    },
    Performed {
        name: String,
        result: Result<Request>,
    },
}

pub fn reduce(
    action: Action,
    state: &mut RootState,
    environment: &Environment,
) -> Effect<RootAction> {
    match action {
        Action::Init(request) => {
            let slice = &mut state.request;
            slice.request = request.unwrap_or_else(|| slice.initial.clone());
            slice.error = None;
            slice.generation += 1;
            Effect::NONE
        }
        Action::Reload => {
            let slice = &mut state.request;
            if slice.loading {
                return Effect::NONE;
            }
            let links = RequestLinks::from_request(&slice.request);
            if let Err(error) = links.self_link() {
                log::error!("cannot reload request: {error}");
                slice.error = Some(error);
                return Effect::NONE;
            }
            slice.loading = true;
            let generation = slice.generation;
            let api = environment.api.clone();
            Effect::future(
                async move { api.get_request(&links).await.map(|response| response.data) },
                move |result| RootAction::Request(Action::Loaded(generation, result)),
            )
        }
        Action::Loaded(generation, result) => {
            let slice = &mut state.request;
            slice.loading = false;
            if generation != slice.generation {
                log::debug!("discarding request reloaded before it was replaced");
                return Effect::NONE;
            }
            match result {
                Ok(request) => {
                    slice.request = request;
                    slice.error = None;
                }
                Err(error) => {
                    log::error!("reloading request failed: {error}");
                    slice.error = Some(error);
                }
            }
            Effect::NONE
        }
        Action::ToggleModal { name, open } => {
            let modals = &mut state.request.action.open_modals;
            if open {
                modals.insert(name);
            } else {
                modals.remove(&name);
            }
            Effect::NONE
        }
        Action::Perform { name, comment } => {
            let slice = &mut state.request;
            if slice.action.loading {
                log::debug!(
                    "ignoring {name}, {} still in flight",
                    slice.action.in_flight.as_deref().unwrap_or_default()
                );
                return Effect::NONE;
            }
            let links = RequestLinks::from_request(&slice.request);
            if let Err(error) = links.action(&name) {
                log::error!("cannot perform {name}: {error}");
                slice.action.error = Some(error);
                return Effect::NONE;
            }
            slice.action.loading = true;
            slice.action.in_flight = Some(name.clone());
            slice.action.error = None;
            let api = environment.api.clone();
            let comment = comment.filter(|c| !c.trim().is_empty());
            let performed = name.clone();
            Effect::future(
                async move {
                    api.perform_action(&links, &name, comment.as_deref())
                        .await
                        .map(|response| response.data)
                },
                move |result| {
                    RootAction::Request(Action::Performed {
                        name: performed,
                        result,
                    })
                },
            )
        }
        Action::Performed { name, result } => {
            let slice = &mut state.request;
            slice.action.loading = false;
            slice.action.in_flight = None;
            slice.action.finished += 1;
            match result {
                Ok(request) => {
                    slice.request = request;
                    slice.generation += 1;
                    slice.action.error = None;
                    slice.action.open_modals.remove(&name);
                    timeline::request_fetch(state, environment)
                }
                Err(error) => {
                    log::error!("{name} failed: {error}");
                    slice.action.error = Some(error);
                    Effect::NONE
                }
            }
        }
    }
}
