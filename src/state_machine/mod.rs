mod job;
mod state;

pub use job::{
    Correlation, FailureKind, GenerationRecord, Job, JobFailure, JobStatus, ToolTally,
};
pub use state::{AgentState, IllegalTransition, ModelTurn, StateMachine, classify};
