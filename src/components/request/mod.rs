//! Request metadata and the actions that can be performed on it.

mod handlers;
mod reducer;

pub use handlers::ActionHandlers;
pub use reducer::{reduce, Action, ActionState, State};
