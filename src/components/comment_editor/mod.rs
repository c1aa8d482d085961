//! Draft and submission of new comments.

mod reducer;

pub use reducer::{reduce, Action, Responder, State, DEFAULT_FORMAT};
