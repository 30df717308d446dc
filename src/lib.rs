//! scriptor: platform-aware content generation driven by a tool-calling
//! model loop, with validation, retries, circuit breaking and sequential
//! batches.

pub mod agent;
pub mod anthropic;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod persist;
pub mod resilience;
pub mod state_machine;
pub mod tools;
pub mod ui;
pub mod validation;

#[cfg(test)]
mod test_support;
