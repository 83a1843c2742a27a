//! HTTP request handlers.

mod channel;
mod health;
mod runs;

pub use channel::run_channel;
pub use health::{health_check, metrics_handler};
pub use runs::{cancel_run, get_run, list_runs, start_run};
