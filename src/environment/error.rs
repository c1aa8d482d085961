use serde::{Deserialize, Serialize};

use crate::view_model::EventId;

/// Validation message for a single field, as returned by the server
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub messages: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// The resource lacks a hypermedia relation we need to follow
    #[error("{relation} link missing from resource")]
    MissingLink { relation: String },

    #[error("could not reach server: {message}")]
    Transport { message: String },

    #[error("server responded with {status_code}: {message}")]
    HttpStatus {
        status_code: u16,
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("unexpected response ({status_code}): {message}")]
    Decode { status_code: u16, message: String },

    #[error("event {0} is not on the current timeline page")]
    ReconciliationMiss(EventId),

    #[error("no {0} value passed")]
    InvalidQuery(&'static str),

    #[error("comment is empty")]
    EmptyComment,

    #[error("another action is still in progress")]
    Busy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    pub fn missing_link(relation: impl Into<String>) -> Self {
        Error::MissingLink {
            relation: relation.into(),
        }
    }

    /// HTTP status of the failed call, if the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status_code, .. } | Error::Decode { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::HttpStatus { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Whether re-triggering the same operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::HttpStatus { .. } | Error::Decode { .. } | Error::Busy
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Config(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
