//! Paginated timeline of a request, kept fresh by a background poller.

mod poller;
mod reconcile;
mod reducer;

pub use poller::{PollHandle, FETCH_TASK_ID};
pub use reconcile::{apply_create, apply_delete, apply_update};
pub use reducer::{apply_local, reduce, request_fetch, settle, Action, LocalChange, State, Ticket};
