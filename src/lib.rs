mod app;
pub mod components;
pub mod environment;
pub mod helper;
pub mod store;
pub mod view_model;

pub use app::{report, run};
pub use environment::{Error, Result};
