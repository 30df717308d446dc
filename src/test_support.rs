//! Scripted model used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::anthropic::{
    AnthropicError, ContentBlock, MessageSender, MessagesRequest, MessagesResponse, StopReason,
    Usage,
};
use crate::config::ValidationConfig;
use crate::persist::NoopStore;
use crate::tools::ToolServices;
use crate::validation::ValidationPipeline;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Tools(Vec<(String, String, Value)>),
    Truncated(String),
    Status(u16),
    Hang,
}

pub fn text(t: &str) -> Reply {
    Reply::Text(t.to_string())
}

pub fn tool(id: &str, name: &str, input: Value) -> Reply {
    Reply::Tools(vec![(id.to_string(), name.to_string(), input)])
}

pub fn response(content: Vec<ContentBlock>, stop: StopReason) -> MessagesResponse {
    MessagesResponse {
        id: "msg_test".into(),
        content,
        model: "claude-test".into(),
        stop_reason: Some(stop),
        usage: Usage {
            input_tokens: 100,
            output_tokens: 50,
        },
    }
}

#[derive(Default)]
pub struct ScriptedSender {
    script: Mutex<VecDeque<Reply>>,
    repeat: Option<Reply>,
    pub calls: AtomicU32,
    pub requests: Mutex<Vec<MessagesRequest>>,
}

impl ScriptedSender {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Replays `reply` once the script runs out.
    pub fn repeating(reply: Reply) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::default()
        }
    }

    pub fn set_repeat(&mut self, reply: Reply) {
        self.repeat = Some(reply);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MessageSender for ScriptedSender {
    async fn send_message(
        &self,
        req: &MessagesRequest,
    ) -> Result<MessagesResponse, AnthropicError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next.or_else(|| self.repeat.clone()) {
            Some(Reply::Text(t)) => Ok(response(vec![ContentBlock::Text { text: t }], StopReason::EndTurn)),
            Some(Reply::Truncated(t)) => Ok(response(
                vec![ContentBlock::Text { text: t }],
                StopReason::MaxTokens,
            )),
            Some(Reply::Tools(calls)) => Ok(response(
                calls
                    .into_iter()
                    .map(|(id, name, input)| ContentBlock::ToolUse { id, name, input })
                    .collect(),
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

/// Tool services with no persistence and no detector.
pub fn offline_services() -> ToolServices {
    ToolServices {
        validation: Arc::new(
            ValidationPipeline::new(&ValidationConfig::default(), None).unwrap(),
        ),
        embedder: Arc::new(NoopStore),
        documents: Arc::new(NoopStore),
    }
}
