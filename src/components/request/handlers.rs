use crate::components::{Action as RootAction, State as RootState};
use crate::environment::Error;
use crate::store::Dispatcher;

use super::Action;

/// Everything a renderer needs to offer the request's actions. Built from a
/// state snapshot and handed down explicitly.
#[derive(Clone)]
pub struct ActionHandlers {
    pub available: Vec<String>,
    pub loading: bool,
    pub error: Option<Error>,
    open_modals: im::OrdSet<String>,
    dispatch: Dispatcher<RootAction>,
}

impl std::fmt::Debug for ActionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandlers")
            .field("available", &self.available)
            .field("loading", &self.loading)
            .field("error", &self.error)
            .field("open_modals", &self.open_modals)
            .finish()
    }
}

impl ActionHandlers {
    pub fn new(state: &RootState, dispatch: Dispatcher<RootAction>) -> Self {
        let slice = &state.request;
        Self {
            available: slice
                .request
                .available_actions()
                .into_iter()
                .map(str::to_string)
                .collect(),
            loading: slice.action.loading,
            error: slice.action.error.clone(),
            open_modals: slice.action.open_modals.clone(),
            dispatch,
        }
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.open_modals.contains(name)
    }

    pub fn open(&self, name: &str) {
        self.toggle(name, true)
    }

    pub fn close(&self, name: &str) {
        self.toggle(name, false)
    }

    pub fn perform(&self, name: &str, comment: Option<String>) {
        (self.dispatch)(RootAction::Request(Action::Perform {
            name: name.to_string(),
            comment,
        }))
    }

    fn toggle(&self, name: &str, open: bool) {
        (self.dispatch)(RootAction::Request(Action::ToggleModal {
            name: name.to_string(),
            open,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::environment::mock::make_request;
    use crate::environment::Config;

    #[test]
    fn handlers_dispatch_request_actions() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let recorder = sent.clone();
        let dispatch: Dispatcher<RootAction> = Arc::new(move |action| {
            recorder.lock().unwrap().push(action);
        });
        let mut state = RootState::new(make_request(), &Config::default());
        state.request.action.open_modals.insert("decline".to_string());

        let handlers = ActionHandlers::new(&state, dispatch);
        assert_eq!(handlers.available, vec!["accept", "decline"]);
        assert!(handlers.is_open("decline"));
        assert!(!handlers.is_open("accept"));

        handlers.open("accept");
        handlers.perform("accept", Some("welcome".to_string()));
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[0],
            RootAction::Request(Action::ToggleModal { name, open: true }) if name == "accept"
        ));
        assert!(matches!(
            &sent[1],
            RootAction::Request(Action::Perform { name, comment: Some(c) })
                if name == "accept" && c == "welcome"
        ));
    }
}
