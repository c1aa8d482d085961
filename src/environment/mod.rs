pub mod error;
pub mod links;
pub mod model;
pub mod repository;
pub mod types;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;

pub use error::{Error, Result};
pub use links::{EventLinks, RequestLinks};
pub use model::{ApiResponse, CommentPayload, Model, RequestsApi};
pub use repository::Repository;
pub use types::{Config, RequestSearch, SortOrder, TimelineQuery};

/// What reducers get to work with: the backend and the configuration
#[derive(Clone)]
pub struct Environment {
    pub api: Arc<dyn RequestsApi>,
    pub config: Config,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .finish()
    }
}

impl Environment {
    pub fn new(api: Arc<dyn RequestsApi>, config: Config) -> Self {
        Self { api, config }
    }
}
