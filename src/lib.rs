pub mod channel;
pub mod cli;
pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod listener;
mod poller;
pub mod sim;
pub mod types;

// Re-export main types
pub use correlation::{ConnectivityState, CorrelationService, ResolveOutcome};
pub use types::*;
