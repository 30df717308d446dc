use serde_json::{Value, json};

use super::{ToolError, ToolMode, ToolName, ToolServices};
use crate::agent::{Platform, prompt};
use crate::anthropic::{
    AnthropicError, Message, MessageSender, MessagesRequest, SystemBlock, ToolCall, ToolResult,
    Usage,
};
use crate::config::ScriptorConfig;
use crate::persist::SearchFilter;
use crate::resilience::CircuitBreaker;
use crate::state_machine::ToolTally;
use crate::validation::{Issue, ValidationReport, normalize_issues};

const FIX_SYSTEM: &str = "You are a careful editor. You change only what the listed issues \
require and keep the author's voice, facts and format.";

/// Runs tool calls for one generation run.
///
/// `execute` always produces exactly one [`ToolResult`] per call: unknown
/// names, handler errors and timeouts all come back as structured error
/// payloads the model can read.
pub struct ToolDispatcher<'a, M> {
    client: &'a M,
    services: &'a ToolServices,
    config: &'a ScriptorConfig,
    platform: Platform,
    mode: ToolMode,
    batch_id: Option<&'a str>,
    breaker: Option<&'a CircuitBreaker>,
    fixes_left: u32,
    tally: ToolTally,
    usage: Usage,
    last_report: Option<ValidationReport>,
    last_revision: Option<String>,
}

impl<'a, M: MessageSender> ToolDispatcher<'a, M> {
    pub fn new(
        client: &'a M,
        services: &'a ToolServices,
        config: &'a ScriptorConfig,
        platform: Platform,
        mode: ToolMode,
    ) -> Self {
        Self {
            client,
            services,
            config,
            platform,
            mode,
            batch_id: None,
            breaker: None,
            fixes_left: 1,
            tally: ToolTally::default(),
            usage: Usage::default(),
            last_report: None,
            last_revision: None,
        }
    }

    /// Scope example searches away from documents written by `batch_id`.
    pub fn with_batch(mut self, batch_id: Option<&'a str>) -> Self {
        self.batch_id = batch_id;
        self
    }

    /// Count failed fix calls against the run's model breaker. The run
    /// already holds admission, so fix calls only report their outcome.
    pub fn with_breaker(mut self, breaker: &'a CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn tally(&self) -> &ToolTally {
        &self.tally
    }

    /// Tokens spent by tools that call the model.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn last_report(&self) -> Option<&ValidationReport> {
        self.last_report.as_ref()
    }

    pub fn last_revision(&self) -> Option<&str> {
        self.last_revision.as_deref()
    }

    pub async fn execute(&mut self, call: &ToolCall) -> ToolResult {
        let Some(tool) = ToolName::parse(&call.name).filter(|t| self.mode.offers(*t)) else {
            tracing::warn!(tool = %call.name, call_id = %call.id, "unknown tool requested");
            self.tally.errors += 1;
            return ToolResult::error(
                &call.id,
                json!({"error": "unknown_tool", "tool": call.name}).to_string(),
            );
        };

        match tool {
            ToolName::ValidateContent => self.tally.validate_content += 1,
            ToolName::ApplyFixes => self.tally.apply_fixes += 1,
            ToolName::SearchExamples => self.tally.search_examples += 1,
        }

        let limit = tool.timeout(&self.config.tools);
        tracing::debug!(tool = tool.as_str(), call_id = %call.id, "executing tool");
        let outcome = tokio::time::timeout(limit, self.run(tool, &call.input)).await;

        match outcome {
            Ok(Ok(value)) => ToolResult::ok(&call.id, value.to_string()),
            Ok(Err(ToolError::BudgetExhausted)) => {
                tracing::info!(call_id = %call.id, "fix budget exhausted");
                self.tally.errors += 1;
                ToolResult::error(&call.id, json!({"error": "fix_budget_exhausted"}).to_string())
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    tool = tool.as_str(),
                    call_id = %call.id,
                    input = %call.input,
                    error = %e,
                    "tool failed"
                );
                self.tally.errors += 1;
                ToolResult::error(
                    &call.id,
                    json!({"error": e.kind(), "tool": tool.as_str(), "message": e.to_string()})
                        .to_string(),
                )
            }
            Err(_) => {
                tracing::warn!(
                    tool = tool.as_str(),
                    call_id = %call.id,
                    limit_secs = limit.as_secs(),
                    "tool timed out"
                );
                self.tally.errors += 1;
                ToolResult::error(
                    &call.id,
                    json!({"error": "timeout", "tool": tool.as_str(), "limit_secs": limit.as_secs()})
                        .to_string(),
                )
            }
        }
    }

    async fn run(&mut self, tool: ToolName, input: &Value) -> Result<Value, ToolError> {
        match tool {
            ToolName::ValidateContent => self.validate_content(input).await,
            ToolName::ApplyFixes => self.apply_fixes(input).await,
            ToolName::SearchExamples => self.search_examples(input).await,
        }
    }

    async fn validate_content(&mut self, input: &Value) -> Result<Value, ToolError> {
        let content = required_str(input, "content")?;
        let report = self
            .services
            .validation
            .validate(content, self.platform)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let mut value =
            serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        value["pass_threshold"] = json!(self.services.validation.pass_threshold());
        self.last_report = Some(report);
        Ok(value)
    }

    async fn apply_fixes(&mut self, input: &Value) -> Result<Value, ToolError> {
        if self.fixes_left == 0 {
            return Err(ToolError::BudgetExhausted);
        }
        let content = required_str(input, "content")?.to_string();
        self.fixes_left -= 1;

        let mut issues: Vec<String> = input
            .get("issues")
            .map(normalize_issues)
            .unwrap_or_default()
            .iter()
            .map(Issue::describe)
            .collect();
        if issues.is_empty() {
            if let Some(report) = &self.last_report {
                issues = report.issues.iter().map(Issue::describe).collect();
            }
        }

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.platform.profile().max_tokens,
            system: vec![SystemBlock::text(FIX_SYSTEM)],
            messages: vec![Message::user_text(prompt::fix_prompt(
                &content,
                &issues,
                self.platform,
            ))],
            tools: Vec::new(),
        };
        let client = self.client;
        let sent = self
            .config
            .retry
            .run_with_hint(
                "apply_fixes",
                AnthropicError::is_transient,
                AnthropicError::retry_after,
                |_| client.send_message(&request),
            )
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                if let Some(breaker) = self.breaker {
                    breaker.record_failure();
                }
                return Err(ToolError::ExternalService(e.to_string()));
            }
        };
        self.usage.add(response.usage);

        let revised = response.text().trim().to_string();
        if revised.is_empty() {
            return Err(ToolError::ExecutionFailed(
                "model returned an empty revision".into(),
            ));
        }
        self.last_revision = Some(revised.clone());
        Ok(json!({"revised_content": revised, "issues_addressed": issues.len()}))
    }

    async fn search_examples(&mut self, input: &Value) -> Result<Value, ToolError> {
        let query = required_str(input, "query")?;
        let max = self.config.tools.search_limit.max(1);
        let limit = input
            .get("limit")
            .and_then(Value::as_u64)
            .map_or(max, |l| (l as usize).clamp(1, max));

        let embedding = self
            .services
            .embedder
            .embed(query)
            .await
            .map_err(|e| ToolError::ExternalService(e.to_string()))?;
        if embedding.is_empty() {
            return Ok(json!({"examples": []}));
        }

        let filter = SearchFilter {
            platform: self.platform,
            exclude_batch: self.batch_id.map(str::to_string),
            limit,
        };
        let hits = self
            .services
            .documents
            .search(&embedding, &filter)
            .await
            .map_err(|e| ToolError::ExternalService(e.to_string()))?;

        let examples: Vec<Value> = hits
            .iter()
            .take(limit)
            .map(|h| json!({"content": h.content, "similarity": h.similarity}))
            .collect();
        Ok(json!({"examples": examples}))
    }
}

fn required_str<'v>(input: &'v Value, key: &str) -> Result<&'v str, ToolError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing string field '{key}'")))
}
