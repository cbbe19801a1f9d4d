//! Automated threat response

pub mod actions;
pub mod executor;

pub use actions::{ActionBackend, ActionError, ActionRecord, InMemoryActions};
pub use executor::{response_prompt, ExecutionOutcome, ResponseAction, ResponseExecutor};
