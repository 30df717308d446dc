use std::fmt;

use serde::{Deserialize, Serialize};

use crate::anthropic::{MessagesResponse, StopReason, ToolCall};

/// The five states of one generation run.
///
/// STARTING → AWAITING_MODEL ⇄ EXECUTING_TOOLS → DONE, with FAILED reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Starting,
    AwaitingModel,
    ExecutingTools,
    Done,
    Failed,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::Done | AgentState::Failed)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Starting => write!(f, "STARTING"),
            AgentState::AwaitingModel => write!(f, "AWAITING_MODEL"),
            AgentState::ExecutingTools => write!(f, "EXECUTING_TOOLS"),
            AgentState::Done => write!(f, "DONE"),
            AgentState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Rejected move between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: AgentState,
    pub to: AgentState,
}

/// Tracks the current state of a run and every state it passed through.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: AgentState,
    history: Vec<AgentState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: AgentState::Starting,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Move to `to` if the edge exists.
    ///
    /// ExecutingTools → Done is legal: it is the forced finalisation when the
    /// iteration cap is hit between tool rounds.
    pub fn advance(&mut self, to: AgentState) -> Result<(), IllegalTransition> {
        use AgentState::*;
        let legal = matches!(
            (self.state, to),
            (Starting, AwaitingModel)
                | (AwaitingModel, ExecutingTools)
                | (AwaitingModel, Done)
                | (ExecutingTools, AwaitingModel)
                | (ExecutingTools, Done)
        ) || (to == Failed && !self.state.is_terminal());

        if !legal {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.history.push(self.state);
        self.state = to;
        Ok(())
    }

    /// Every state visited so far, including the current one.
    pub fn transitions(&self) -> Vec<AgentState> {
        let mut all = self.history.clone();
        all.push(self.state);
        all
    }
}

/// What the loop should do with one model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Natural-language answer. `truncated` marks a token-limit stop.
    Final { text: String, truncated: bool },
    /// The model asked for tools; `text` is any narration alongside them.
    ToolRequests { text: String, calls: Vec<ToolCall> },
}

/// Classify a response by its stop condition.
///
/// - `max_tokens` is always final: the partial text is kept, and any tool
///   request cut off mid-block is ignored.
/// - `tool_use` without any tool block degrades to a final answer.
/// - Any other stop reason with tool blocks present is treated as a tool
///   request.
pub fn classify(response: &MessagesResponse) -> ModelTurn {
    let text = response.text();
    if response.stop_reason == Some(StopReason::MaxTokens) {
        return ModelTurn::Final {
            text,
            truncated: true,
        };
    }

    let calls = response.tool_calls();
    if calls.is_empty() {
        ModelTurn::Final {
            text,
            truncated: false,
        }
    } else {
        ModelTurn::ToolRequests { text, calls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anthropic::{ContentBlock, Usage};
    use serde_json::json;

    fn response(stop: Option<StopReason>, content: Vec<ContentBlock>) -> MessagesResponse {
        MessagesResponse {
            id: "msg".into(),
            content,
            model: "mock".into(),
            stop_reason: stop,
            usage: Usage::default(),
        }
    }

    fn text(t: &str) -> ContentBlock {
        ContentBlock::Text { text: t.into() }
    }

    fn tool_use(id: &str) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.into(),
            name: "validate_content".into(),
            input: json!({}),
        }
    }

    #[test]
    fn happy_path_walks_states() {
        let mut sm = StateMachine::new();
        sm.advance(AgentState::AwaitingModel).unwrap();
        sm.advance(AgentState::ExecutingTools).unwrap();
        sm.advance(AgentState::AwaitingModel).unwrap();
        sm.advance(AgentState::Done).unwrap();
        assert_eq!(
            sm.transitions(),
            vec![
                AgentState::Starting,
                AgentState::AwaitingModel,
                AgentState::ExecutingTools,
                AgentState::AwaitingModel,
                AgentState::Done
            ]
        );
    }

    #[test]
    fn failed_reachable_from_any_live_state() {
        for path in [
            vec![],
            vec![AgentState::AwaitingModel],
            vec![AgentState::AwaitingModel, AgentState::ExecutingTools],
        ] {
            let mut sm = StateMachine::new();
            for s in path {
                sm.advance(s).unwrap();
            }
            assert!(sm.advance(AgentState::Failed).is_ok());
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let mut sm = StateMachine::new();
        sm.advance(AgentState::Failed).unwrap();
        let err = sm.advance(AgentState::AwaitingModel).unwrap_err();
        assert_eq!(err.to_string(), "illegal transition FAILED -> AWAITING_MODEL");
        assert!(sm.advance(AgentState::Failed).is_err());
    }

    #[test]
    fn cannot_skip_model_call() {
        let mut sm = StateMachine::new();
        assert!(sm.advance(AgentState::Done).is_err());
        assert!(sm.advance(AgentState::ExecutingTools).is_err());
    }

    #[test]
    fn classify_end_turn_is_final() {
        let turn = classify(&response(Some(StopReason::EndTurn), vec![text("post")]));
        assert_eq!(
            turn,
            ModelTurn::Final {
                text: "post".into(),
                truncated: false
            }
        );
    }

    #[test]
    fn classify_tool_use() {
        let turn = classify(&response(
            Some(StopReason::ToolUse),
            vec![text("checking"), tool_use("t1"), tool_use("t2")],
        ));
        match turn {
            ModelTurn::ToolRequests { text, calls } => {
                assert_eq!(text, "checking");
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[1].id, "t2");
            }
            other => panic!("expected tool requests, got {other:?}"),
        }
    }

    #[test]
    fn classify_max_tokens_keeps_partial_text() {
        let turn = classify(&response(
            Some(StopReason::MaxTokens),
            vec![text("half a po"), tool_use("t1")],
        ));
        assert_eq!(
            turn,
            ModelTurn::Final {
                text: "half a po".into(),
                truncated: true
            }
        );
    }

    #[test]
    fn classify_tool_use_without_blocks_is_final() {
        let turn = classify(&response(Some(StopReason::ToolUse), vec![text("no tools")]));
        assert!(matches!(turn, ModelTurn::Final { truncated: false, .. }));
    }

    #[test]
    fn state_display() {
        assert_eq!(AgentState::Starting.to_string(), "STARTING");
        assert_eq!(AgentState::AwaitingModel.to_string(), "AWAITING_MODEL");
        assert_eq!(AgentState::ExecutingTools.to_string(), "EXECUTING_TOOLS");
        assert_eq!(AgentState::Done.to_string(), "DONE");
        assert_eq!(AgentState::Failed.to_string(), "FAILED");
    }
}
