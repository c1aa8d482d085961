//! Editing and deleting single comments of the timeline.

mod reducer;

pub use reducer::{reduce, Action, EventState, State};
