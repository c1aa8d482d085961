pub mod comment_editor;
pub mod request;
pub mod timeline;
pub mod timeline_event;

use crate::environment::{Config, Environment};
use crate::store::{Effect, Reducer};
use crate::view_model::Request;

/// Everything the request page holds. Each slice is only mutated by its
/// own component's reducer.
#[derive(Clone, Debug)]
pub struct State {
    pub request: request::State,
    pub timeline: timeline::State,
    pub editor: comment_editor::State,
    pub events: timeline_event::State,
}

impl State {
    pub fn new(request: Request, config: &Config) -> Self {
        Self {
            request: request::State::new(request),
            timeline: timeline::State::new(config),
            editor: Default::default(),
            events: Default::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Action {
    Request(request::Action),
    Timeline(timeline::Action),
    Editor(comment_editor::Action),
    Event(timeline_event::Action),
}

pub struct RequestPage;

impl Reducer for RequestPage {
    type Action = Action;

    type State = State;

    type Environment = Environment;

    fn reduce(action: Action, state: &mut State, environment: &Environment) -> Effect<Action> {
        log::trace!("{action:?}");
        match action {
            Action::Request(action) => request::reduce(action, state, environment),
            Action::Timeline(action) => timeline::reduce(action, state, environment),
            Action::Editor(action) => comment_editor::reduce(action, state, environment),
            Action::Event(action) => timeline_event::reduce(action, state, environment),
        }
    }

    fn initial_action() -> Option<Action> {
        Some(Action::Timeline(timeline::Action::Mount))
    }
}
