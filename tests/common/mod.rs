//! Scripted model shared by the scenario tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::Value;

use scriptor::anthropic::{
    AnthropicError, ContentBlock, MessageSender, MessagesRequest, MessagesResponse, StopReason,
    Usage,
};
use scriptor::config::ScriptorConfig;
use scriptor::orchestrator::{Collaborators, ContentOrchestrator};

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Tool(String, String, Value),
    Status(u16),
    Hang,
}

pub fn text(t: &str) -> Reply {
    Reply::Text(t.to_string())
}

pub fn tool(id: &str, name: &str, input: Value) -> Reply {
    Reply::Tool(id.to_string(), name.to_string(), input)
}

#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    calls: AtomicU32,
    requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn repeating(reply: Reply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<MessagesRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn response(content: Vec<ContentBlock>, stop: StopReason) -> MessagesResponse {
    MessagesResponse {
        id: "msg_scenario".into(),
        content,
        model: "claude-test".into(),
        stop_reason: Some(stop),
        usage: Usage {
            input_tokens: 200,
            output_tokens: 80,
        },
    }
}

impl MessageSender for ScriptedModel {
    async fn send_message(
        &self,
        req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next.or_else(|| self.repeat.clone()) {
            Some(Reply::Text(text)) => Ok(response(
                vec![ContentBlock::Text { text }],
                StopReason::EndTurn,
            )),
            Some(Reply::Tool(id, name, input)) => Ok(response(
                vec![ContentBlock::ToolUse { id, name, input }],
                StopReason::ToolUse,
            )),
            Some(Reply::Status(status)) => Err(AnthropicError::ApiError {
                status,
                message: "scripted failure".into(),
            }),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(AnthropicError::ParseError("script exhausted".into())),
        }
    }
}

pub fn orchestrator(
    model: Arc<ScriptedModel>,
    config: ScriptorConfig,
) -> ContentOrchestrator<ScriptedModel> {
    ContentOrchestrator::new(model, Arc::new(config), Collaborators::offline()).unwrap()
}

/// Text of every tool_result block in the last loop request, in order.
pub fn tool_result_texts(requests: &[MessagesRequest]) -> Vec<String> {
    requests
        .iter()
        .rev()
        .find(|req| !req.tools.is_empty())
        .map(|req| {
            req.messages
                .iter()
                .flat_map(|m| m.content.iter())
                .filter_map(|b| match b {
                    ContentBlock::ToolResult { content, .. } => Some(content.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
