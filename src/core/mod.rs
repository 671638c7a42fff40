//! Core types - pure abstractions shared across the codebase.

mod mode;
mod state;

pub use mode::{BuildMode, MinifyPolicy};
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
