use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;

use super::conversation::ConversationState;
use super::prompt;
use crate::anthropic::{
    AnthropicError, MessageSender, MessagesRequest, MessagesResponse, SystemBlock, Usage,
};
use crate::config::ScriptorConfig;
use crate::resilience::{Admission, CircuitBreaker, RetryPolicy};
use crate::state_machine::{
    AgentState, FailureKind, GenerationRecord, Job, JobFailure, JobStatus, ModelTurn,
    StateMachine, classify,
};
use crate::tools::{self, ToolDispatcher, ToolMode, ToolServices};
use crate::validation::ValidationReport;

/// Successful end of one generation run.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub text: String,
    /// The model stopped on its token limit.
    pub truncated: bool,
    pub last_report: Option<ValidationReport>,
    pub record: GenerationRecord,
}

/// Failed end of one generation run. Callers never see a raw error.
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub failure: JobFailure,
    pub record: GenerationRecord,
}

#[derive(Default)]
struct RunStats {
    model_calls: u32,
    iterations: u32,
    usage: Usage,
}

/// Drives one job at a time through the tool-calling loop.
///
/// The agent owns a circuit breaker that outlives individual jobs: repeated
/// failures on this agent make later jobs fail fast without a model call.
pub struct GenerationAgent<M> {
    client: Arc<M>,
    services: ToolServices,
    config: Arc<ScriptorConfig>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl<M: MessageSender> GenerationAgent<M> {
    pub fn new(client: Arc<M>, services: ToolServices, config: Arc<ScriptorConfig>) -> Self {
        let breaker = CircuitBreaker::new(
            config.breaker.failure_threshold,
            Duration::from_secs(config.breaker.recovery_timeout_secs),
        );
        let retry = config.retry.clone();
        Self {
            client,
            services,
            config,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn run(&self, job: &Job) -> Result<GenerationRun, GenerationFailure> {
        self.run_scoped(job, None).await
    }

    /// Run a job that belongs to batch `batch_id`.
    pub async fn run_scoped(
        &self,
        job: &Job,
        batch_id: Option<&str>,
    ) -> Result<GenerationRun, GenerationFailure> {
        let span = tracing::info_span!(
            "generation",
            job_id = %job.id,
            platform = %job.platform,
            thinking = job.thinking
        );
        self.run_inner(job, batch_id).instrument(span).await
    }

    async fn run_inner(
        &self,
        job: &Job,
        batch_id: Option<&str>,
    ) -> Result<GenerationRun, GenerationFailure> {
        let started_at = Utc::now();
        let mut sm = StateMachine::new();

        match self.breaker.try_acquire() {
            Ok(Admission::Normal) => {}
            Ok(Admission::Trial) => tracing::info!("breaker half-open, running trial job"),
            Err(open) => {
                tracing::warn!(error = %open, "rejected by circuit breaker");
                mark_failed(&mut sm);
                let failure = JobFailure::new(
                    FailureKind::BreakerOpen {
                        retry_after_secs: open.retry_after().as_secs_f64().ceil() as u64,
                    },
                    open.to_string(),
                );
                return Err(GenerationFailure {
                    failure,
                    record: GenerationRecord::new(
                        job,
                        JobStatus::Failed,
                        sm.transitions(),
                        started_at,
                    ),
                });
            }
        }

        let mode = ToolMode::for_job(job.thinking);
        let mut dispatcher = ToolDispatcher::new(
            self.client.as_ref(),
            &self.services,
            &self.config,
            job.platform,
            mode,
        )
        .with_batch(batch_id)
        .with_breaker(&self.breaker);
        let mut stats = RunStats::default();

        let outcome = self
            .drive(job, mode, &mut dispatcher, &mut sm, &mut stats)
            .await;

        let mut usage = stats.usage;
        usage.add(dispatcher.usage());

        let (status, result) = match outcome {
            Ok((text, truncated)) => {
                self.breaker.record_success();
                if let Err(e) = sm.advance(AgentState::Done) {
                    tracing::error!(error = %e, "state machine rejected completion");
                }
                (JobStatus::Completed, Ok((text, truncated)))
            }
            Err(failure) => {
                self.breaker.record_failure();
                mark_failed(&mut sm);
                (JobStatus::Failed, Err(failure))
            }
        };

        let mut record = GenerationRecord::new(job, status, sm.transitions(), started_at);
        record.iterations = stats.iterations;
        record.tools = dispatcher.tally().clone();
        record.usage = usage;

        tracing::info!(
            status = ?record.status,
            iterations = record.iterations,
            model_calls = stats.model_calls,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            duration_ms = record.duration_ms,
            "generation finished"
        );

        match result {
            Ok((text, truncated)) => Ok(GenerationRun {
                text,
                truncated,
                last_report: dispatcher.last_report().cloned(),
                record,
            }),
            Err(failure) => {
                tracing::warn!(failure = %failure, "generation failed");
                Err(GenerationFailure { failure, record })
            }
        }
    }

    async fn drive(
        &self,
        job: &Job,
        mode: ToolMode,
        dispatcher: &mut ToolDispatcher<'_, M>,
        sm: &mut StateMachine,
        stats: &mut RunStats,
    ) -> Result<(String, bool), JobFailure> {
        let agent = &self.config.agent;
        let system = prompt::system_prompt(job, mode);
        let tool_defs = tools::definitions(mode);
        let max_tokens = job.platform.profile().max_tokens;
        let cap = agent.iteration_cap(job.thinking);
        let mut conversation = ConversationState::new(prompt::job_brief(job));
        let mut last_text = String::new();

        step(sm, AgentState::AwaitingModel)?;

        loop {
            let request = MessagesRequest {
                model: self.config.model.clone(),
                max_tokens,
                system: vec![SystemBlock::cached(system.as_str())],
                messages: conversation.messages().to_vec(),
                tools: tool_defs.clone(),
            };

            let response = self
                .call_model(&request, stats.model_calls == 0)
                .await
                .map_err(failure_from)?;
            stats.model_calls += 1;
            stats.usage.add(response.usage);
            conversation.push_assistant(&response.content);

            match classify(&response) {
                ModelTurn::Final { text, truncated } => {
                    if truncated {
                        if !agent.accept_truncated {
                            return Err(JobFailure::new(
                                FailureKind::Truncated,
                                format!("output hit max_tokens ({max_tokens})"),
                            ));
                        }
                        tracing::warn!(max_tokens, "output truncated, keeping partial text");
                    }
                    let text = if text.trim().is_empty() {
                        best_available(dispatcher.last_revision(), &last_text)
                    } else {
                        text
                    };
                    if text.trim().is_empty() {
                        return Err(JobFailure::new(
                            FailureKind::EmptyResponse,
                            "model finished without any text",
                        ));
                    }
                    return Ok((text, truncated));
                }
                ModelTurn::ToolRequests { text, calls } => {
                    if !text.trim().is_empty() {
                        last_text = text;
                    }

                    let spent = stats.usage.output_tokens + dispatcher.usage().output_tokens;
                    if stats.iterations >= cap || spent >= agent.max_total_tokens {
                        tracing::warn!(
                            iterations = stats.iterations,
                            output_tokens = spent,
                            "loop cap reached, finalizing with best available text"
                        );
                        let text = best_available(dispatcher.last_revision(), &last_text);
                        if text.trim().is_empty() {
                            return Err(JobFailure::new(
                                FailureKind::IterationLimit,
                                format!(
                                    "stopped after {} tool rounds and {spent} output tokens with no text",
                                    stats.iterations
                                ),
                            ));
                        }
                        return Ok((text, false));
                    }

                    step(sm, AgentState::ExecutingTools)?;
                    stats.iterations += 1;
                    tracing::debug!(
                        iteration = stats.iterations,
                        calls = calls.len(),
                        "executing tool round"
                    );

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(dispatcher.execute(call).await);
                    }
                    conversation.push_tool_results(results);
                    step(sm, AgentState::AwaitingModel)?;
                }
            }
        }
    }

    /// One model call with per-attempt timeout and retry on transient errors.
    async fn call_model(
        &self,
        request: &MessagesRequest,
        first_call: bool,
    ) -> Result<MessagesResponse, AnthropicError> {
        let limit = self.config.agent.call_timeout(first_call);
        let client = self.client.as_ref();
        self.retry
            .run_with_hint(
                "messages",
                AnthropicError::is_transient,
                AnthropicError::retry_after,
                |attempt| async move {
                    tracing::debug!(attempt, timeout_secs = limit.as_secs(), "calling model");
                    match tokio::time::timeout(limit, client.send_message(request)).await {
                        Ok(result) => result,
                        Err(_) => Err(AnthropicError::Timeout { after: limit }),
                    }
                },
            )
            .await
    }
}

fn best_available(revision: Option<&str>, last_text: &str) -> String {
    revision
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(last_text)
        .to_string()
}

fn failure_from(err: AnthropicError) -> JobFailure {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_transient() {
        FailureKind::Transient
    } else {
        FailureKind::Fatal
    };
    JobFailure::new(kind, err.to_string())
}

fn step(sm: &mut StateMachine, to: AgentState) -> Result<(), JobFailure> {
    sm.advance(to)
        .map_err(|e| JobFailure::new(FailureKind::Fatal, e.to_string()))
}

fn mark_failed(sm: &mut StateMachine) {
    if let Err(e) = sm.advance(AgentState::Failed) {
        tracing::error!(error = %e, "state machine rejected failure");
    }
}
