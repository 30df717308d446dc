//! The per-job tool-calling loop and its inputs.

mod conversation;
mod generation;
mod platform;
pub mod prompt;

pub use conversation::ConversationState;
pub use generation::{GenerationAgent, GenerationFailure, GenerationRun};
pub use platform::{Platform, PlatformProfile, UnitKind};
