use crate::components::timeline::{self, LocalChange};
use crate::components::{Action as RootAction, State as RootState};
use crate::environment::{CommentPayload, Environment, Error, RequestLinks, Result};
use crate::store::Effect;
use crate::view_model::TimelineEvent;

pub const DEFAULT_FORMAT: &str = "html";

/// Receives the outcome of a submission, so callers can react to failures
/// beyond what the editor state shows
pub type Responder = flume::Sender<Result<TimelineEvent>>;

#[derive(Clone, Debug, Default)]
pub struct State {
    pub content: String,
    pub submitting: bool,
    pub error: Option<Error>,
}

#[derive(Clone, Debug)]
pub enum Action {
    SetContent(String),
    Submit {
        format: Option<String>,
        responder: Option<Responder>,
    },
    Submitted(Result<TimelineEvent>, Option<Responder>),
}

pub fn reduce(
    action: Action,
    state: &mut RootState,
    environment: &Environment,
) -> Effect<RootAction> {
    match action {
        Action::SetContent(content) => {
            state.editor.content = content;
            Effect::NONE
        }
        Action::Submit { format, responder } => {
            let editor = &mut state.editor;
            if editor.submitting {
                respond(responder, Err(Error::Busy));
                return Effect::NONE;
            }
            if editor.content.trim().is_empty() {
                editor.error = Some(Error::EmptyComment);
                respond(responder, Err(Error::EmptyComment));
                return Effect::NONE;
            }
            let links = RequestLinks::from_request(&state.request.request);
            if let Err(error) = links.comments() {
                editor.error = Some(error.clone());
                respond(responder, Err(error));
                return Effect::NONE;
            }
            editor.submitting = true;
            editor.error = None;
            let payload = CommentPayload::new(
                editor.content.clone(),
                format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            );
            let api = environment.api.clone();
            Effect::future(
                async move {
                    api.submit_comment(&links, &payload)
                        .await
                        .map(|response| response.data)
                },
                move |result| RootAction::Editor(Action::Submitted(result, responder)),
            )
        }
        Action::Submitted(result, responder) => {
            state.editor.submitting = false;
            match &result {
                Ok(event) => {
                    state.editor.content.clear();
                    state.editor.error = None;
                    timeline::apply_local(&mut state.timeline, LocalChange::Created(event.clone()));
                }
                Err(error) => {
                    log::error!("comment submission failed: {error}");
                    state.editor.error = Some(error.clone());
                }
            }
            respond(responder, result);
            timeline::settle(state, environment)
        }
    }
}

fn respond(responder: Option<Responder>, result: Result<TimelineEvent>) {
    if let Some(responder) = responder {
        // nobody listening anymore
        let _ = responder.send(result);
    }
}
