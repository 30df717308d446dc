use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::AgentState;
use crate::agent::Platform;
use crate::anthropic::Usage;

/// Why a generation ended without content.
///
/// Every failed job carries exactly one of these so callers and batch
/// summaries can tell a stuck model apart from a bad request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Rejected by the circuit breaker without calling the model.
    BreakerOpen { retry_after_secs: u64 },
    /// A model call or the whole job exceeded its time limit.
    Timeout,
    /// Network / 5xx / rate-limit failure that survived every retry.
    Transient,
    /// Auth failure, malformed request, unreadable response.
    Fatal,
    /// Output hit the token limit and partial output is not accepted.
    Truncated,
    /// Iteration or token cap reached with no text to fall back on.
    IterationLimit,
    /// The model finished without producing any text.
    EmptyResponse,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::BreakerOpen { retry_after_secs } => {
                write!(f, "breaker open (retry after {retry_after_secs}s)")
            }
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Transient => write!(f, "transient failure"),
            FailureKind::Fatal => write!(f, "fatal failure"),
            FailureKind::Truncated => write!(f, "truncated output"),
            FailureKind::IterationLimit => write!(f, "iteration limit"),
            FailureKind::EmptyResponse => write!(f, "empty response"),
        }
    }
}

/// A failure with its classification and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    #[serde(flatten)]
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Terminal status of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed,
}

/// Ids used by downstream persistence and notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

fn default_style() -> String {
    "default".to_string()
}

fn default_target_score() -> u32 {
    18
}

/// One unit of content-generation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(default = "new_id")]
    pub id: String,
    pub platform: Platform,
    pub topic: String,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_target_score")]
    pub target_score: u32,
    /// Adds the validate-then-fix round.
    #[serde(default)]
    pub thinking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<NaiveDate>,
    #[serde(default)]
    pub correlation: Correlation,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Job {
    pub fn new(platform: Platform, topic: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            platform,
            topic: topic.into(),
            context: String::new(),
            style: default_style(),
            target_score: default_target_score(),
            thinking: false,
            publish_date: None,
            correlation: Correlation::default(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }

    pub fn with_publish_date(mut self, date: NaiveDate) -> Self {
        self.publish_date = Some(date);
        self
    }

    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }
}

/// Counts of tool invocations during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTally {
    pub validate_content: u32,
    pub apply_fixes: u32,
    pub search_examples: u32,
    pub errors: u32,
}

/// Structured record produced when a generation run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub job_id: String,
    pub platform: Platform,
    pub status: JobStatus,
    pub state_transitions: Vec<AgentState>,
    pub iterations: u32,
    pub tools: ToolTally,
    pub usage: Usage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl GenerationRecord {
    pub fn new(
        job: &Job,
        status: JobStatus,
        state_transitions: Vec<AgentState>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job.id.clone(),
            platform: job.platform,
            status,
            state_transitions,
            iterations: 0,
            tools: ToolTally::default(),
            usage: Usage::default(),
            started_at,
            completed_at: now,
            duration_ms: (now - started_at).num_milliseconds(),
        }
    }
}
