//! Tools the generation loop may request, and the dispatcher that runs them.

mod dispatcher;
mod schema;

use std::sync::Arc;
use std::time::Duration;

use crate::anthropic::ToolDefinition;
use crate::config::ToolsConfig;
use crate::persist::{DocumentStore, Embedder};
use crate::validation::ValidationPipeline;

pub use dispatcher::ToolDispatcher;

/// The closed set of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ValidateContent,
    ApplyFixes,
    SearchExamples,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "validate_content" => Some(ToolName::ValidateContent),
            "apply_fixes" => Some(ToolName::ApplyFixes),
            "search_examples" => Some(ToolName::SearchExamples),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ValidateContent => "validate_content",
            ToolName::ApplyFixes => "apply_fixes",
            ToolName::SearchExamples => "search_examples",
        }
    }

    /// Time limit for one invocation. Validation is composite and gets the
    /// long tier.
    pub fn timeout(self, config: &ToolsConfig) -> Duration {
        match self {
            ToolName::ValidateContent => Duration::from_secs(config.long_timeout_secs),
            ToolName::ApplyFixes | ToolName::SearchExamples => {
                Duration::from_secs(config.short_timeout_secs)
            }
        }
    }

    pub fn definition(self) -> ToolDefinition {
        match self {
            ToolName::ValidateContent => schema::validate_content(),
            ToolName::ApplyFixes => schema::apply_fixes(),
            ToolName::SearchExamples => schema::search_examples(),
        }
    }
}

/// Which tool set a run gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Default,
    /// Adds `apply_fixes` for the validate-then-fix round.
    Thinking,
}

impl ToolMode {
    pub fn for_job(thinking: bool) -> Self {
        if thinking {
            ToolMode::Thinking
        } else {
            ToolMode::Default
        }
    }

    pub fn tools(self) -> &'static [ToolName] {
        match self {
            ToolMode::Default => &[ToolName::ValidateContent, ToolName::SearchExamples],
            ToolMode::Thinking => &[
                ToolName::ValidateContent,
                ToolName::ApplyFixes,
                ToolName::SearchExamples,
            ],
        }
    }

    pub fn offers(self, tool: ToolName) -> bool {
        self.tools().contains(&tool)
    }
}

/// JSON-schema tool definitions sent with every request in `mode`.
pub fn definitions(mode: ToolMode) -> Vec<ToolDefinition> {
    mode.tools().iter().map(|t| t.definition()).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("fix budget exhausted")]
    BudgetExhausted,
}

impl ToolError {
    /// Value of the `error` field in the structured result.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidParameters(_) => "invalid_parameters",
            ToolError::ExecutionFailed(_) => "execution_failed",
            ToolError::ExternalService(_) => "external_service",
            ToolError::BudgetExhausted => "fix_budget_exhausted",
        }
    }
}

/// Shared services the tools call into. Lives as long as the agent.
#[derive(Clone)]
pub struct ToolServices {
    pub validation: Arc<ValidationPipeline>,
    pub embedder: Arc<dyn Embedder>,
    pub documents: Arc<dyn DocumentStore>,
}
