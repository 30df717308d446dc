use serde_json::json;

use crate::anthropic::ToolDefinition;

pub(super) fn validate_content() -> ToolDefinition {
    ToolDefinition {
        name: "validate_content".into(),
        description: "Score a draft against the five-axis rubric and the machine-origin \
                      detector. Returns per-axis scores, the total out of 25, a list of \
                      issues and a pass/revise decision."
            .into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The full draft to validate."
                }
            },
            "required": ["content"]
        }),
    }
}

pub(super) fn apply_fixes() -> ToolDefinition {
    ToolDefinition {
        name: "apply_fixes".into(),
        description: "Rewrite a draft so it resolves the given issues. Can be called once \
                      per job; later calls are rejected."
            .into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The draft to revise."
                },
                "issues": {
                    "type": "array",
                    "description": "Issues returned by validate_content, as strings or objects.",
                    "items": {}
                }
            },
            "required": ["content"]
        }),
    }
}

pub(super) fn search_examples() -> ToolDefinition {
    ToolDefinition {
        name: "search_examples".into(),
        description: "Find previously published posts for the same platform that are \
                      similar to a query."
            .into(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What the examples should be about."
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 10
                }
            },
            "required": ["query"]
        }),
    }
}
