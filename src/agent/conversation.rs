use crate::anthropic::{ContentBlock, Message, ToolResult};

/// Append-only message history of one generation run.
///
/// The system prompt travels separately on each request. Nothing here is
/// ever shared with another job.
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(brief: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user_text(brief)],
        }
    }

    /// Record the assistant's reply. Unknown and empty text blocks are not
    /// sent back to the API.
    pub fn push_assistant(&mut self, blocks: &[ContentBlock]) {
        let kept: Vec<ContentBlock> = blocks
            .iter()
            .filter(|b| match b {
                ContentBlock::Text { text } => !text.trim().is_empty(),
                ContentBlock::Unknown => false,
                _ => true,
            })
            .cloned()
            .collect();
        if !kept.is_empty() {
            self.messages.push(Message::assistant(kept));
        }
    }

    /// Append all results of one tool round as a single user turn.
    pub fn push_tool_results(&mut self, results: Vec<ToolResult>) {
        if !results.is_empty() {
            self.messages.push(Message::tool_results(results));
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anthropic::Role;
    use serde_json::json;

    #[test]
    fn starts_with_the_brief() {
        let c = ConversationState::new("Write about Rust");
        assert_eq!(c.len(), 1);
        assert_eq!(c.messages()[0].role, Role::User);
    }

    #[test]
    fn assistant_turn_drops_noise_blocks() {
        let mut c = ConversationState::new("brief");
        c.push_assistant(&[
            ContentBlock::Text { text: "  ".into() },
            ContentBlock::Unknown,
            ContentBlock::ToolUse {
                id: "t1".into(),
                name: "validate_content".into(),
                input: json!({"content": "x"}),
            },
        ]);
        assert_eq!(c.len(), 2);
        assert_eq!(c.messages()[1].content.len(), 1);

        c.push_assistant(&[ContentBlock::Unknown]);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn tool_results_form_one_turn() {
        let mut c = ConversationState::new("brief");
        c.push_tool_results(vec![ToolResult::ok("t1", "{}"), ToolResult::error("t2", "{}")]);
        assert_eq!(c.len(), 2);
        let turn = &c.messages()[1];
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content.len(), 2);

        c.push_tool_results(Vec::new());
        assert_eq!(c.len(), 2);
    }
}
