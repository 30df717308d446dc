//! Tipos de dados para requisições e respostas da API Anthropic Messages.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato esperado pelo endpoint `v1/messages`, incluindo os
//! blocos `tool_use` e `tool_result` usados pelo loop de ferramentas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Corpo da requisição para o endpoint `/v1/messages` da API Anthropic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    /// Identificador do modelo a ser usado (ex.: "claude-sonnet-4-5-20250929").
    pub model: String,
    /// Número máximo de tokens na resposta gerada pelo modelo.
    pub max_tokens: u32,
    /// Prompt de sistema, enviado separado das mensagens.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<SystemBlock>,
    /// Lista de mensagens compondo a conversa (usuário e assistente).
    pub messages: Vec<Message>,
    /// Ferramentas que o modelo pode solicitar.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// Um bloco de texto do prompt de sistema, opcionalmente marcado para cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl SystemBlock {
    /// Bloco de texto simples, sem cache.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: "text".into(),
            text: text.into(),
            cache_control: None,
        }
    }

    /// Bloco de texto marcado com `cache_control: ephemeral`.
    pub fn cached(text: impl Into<String>) -> Self {
        Self {
            cache_control: Some(CacheControl {
                kind: "ephemeral".into(),
            }),
            ..Self::text(text)
        }
    }
}

/// Controle de cache de prompt da API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Papel do remetente de uma mensagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Uma única mensagem em uma conversa com a API Anthropic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Papel do remetente.
    pub role: Role,
    /// Blocos de conteúdo da mensagem.
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Mensagem do usuário com um único bloco de texto.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Mensagem do assistente reproduzindo os blocos retornados pela API.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Turno do usuário carregando os resultados das ferramentas executadas.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results
                .into_iter()
                .map(|r| ContentBlock::ToolResult {
                    tool_use_id: r.tool_use_id,
                    content: r.content,
                    is_error: r.is_error,
                })
                .collect(),
        }
    }
}

/// Um bloco de conteúdo de mensagem ou de resposta.
///
/// O discriminante é serializado no campo `"type"` do JSON. Tipos de bloco
/// desconhecidos (ex.: `thinking`) são aceitos como [`ContentBlock::Unknown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

/// Definição de ferramenta enviada no campo `tools` da requisição.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Motivo da parada da geração.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

/// Resposta retornada pelo endpoint `/v1/messages` da API Anthropic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Identificador único da resposta (gerado pela API).
    pub id: String,
    /// Blocos de conteúdo na resposta (texto e/ou pedidos de ferramenta).
    pub content: Vec<ContentBlock>,
    /// Modelo que gerou a resposta.
    pub model: String,
    /// Motivo da parada. `None` se ainda em progresso.
    pub stop_reason: Option<StopReason>,
    /// Estatísticas de uso de tokens (entrada e saída).
    #[serde(default)]
    pub usage: Usage,
}

impl MessagesResponse {
    /// Concatena todos os blocos de texto da resposta.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Extrai os pedidos de ferramenta na ordem em que aparecem.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Estatísticas de consumo de tokens para uma chamada à API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Número de tokens consumidos na entrada (prompt).
    pub input_tokens: u32,
    /// Número de tokens gerados na saída (resposta).
    pub output_tokens: u32,
}

impl Usage {
    /// Soma o uso de outra chamada a este acumulador.
    pub fn add(&mut self, other: Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Pedido de execução de ferramenta emitido pelo modelo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identificador de correlação emitido pelo modelo.
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Resultado de uma ferramenta, sempre emparelhado com um [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::ok(tool_use_id, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_empty_system_and_tools() {
        let req = MessagesRequest {
            model: "claude-sonnet-4-5-20250929".into(),
            max_tokens: 1024,
            system: vec![],
            messages: vec![Message::user_text("Hello")],
            tools: vec![],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn cached_system_block_serializes_cache_control() {
        let json = serde_json::to_value(SystemBlock::cached("rules")).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["cache_control"]["type"], "ephemeral");

        let plain = serde_json::to_value(SystemBlock::text("rules")).unwrap();
        assert!(plain.get("cache_control").is_none());
    }

    #[test]
    fn tool_result_turn_is_user_role() {
        let msg = Message::tool_results(vec![ToolResult {
            tool_use_id: "toolu_1".into(),
            content: "{}".into(),
            is_error: true,
        }]);
        assert_eq!(msg.role, Role::User);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["is_error"], true);
    }

    #[test]
    fn tool_result_omits_false_error_flag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "t".into(),
            content: "ok".into(),
            is_error: false,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert!(json.get("is_error").is_none());
    }

    #[test]
    fn response_with_tool_use_deserializes_from_api_format() {
        let api_json = r#"{
            "id": "msg_123",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_9", "name": "validate_content", "input": {"content": "x"}}
            ],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 5, "output_tokens": 15}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(api_json).unwrap();
        assert_eq!(resp.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(resp.text(), "Let me check.");
        let calls = resp.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "validate_content");
        assert_eq!(calls[0].input, json!({"content": "x"}));
    }

    #[test]
    fn unknown_block_and_stop_reason_are_tolerated() {
        let json = r#"{
            "id": "msg_456",
            "content": [{"type": "thinking", "thinking": "hmm"}, {"type": "text", "text": "done"}],
            "model": "test",
            "stop_reason": "pause_turn",
            "usage": {"input_tokens": 0, "output_tokens": 0}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content[0], ContentBlock::Unknown);
        assert_eq!(resp.stop_reason, Some(StopReason::Other));
        assert_eq!(resp.text(), "done");
    }

    #[test]
    fn messages_response_null_stop_reason() {
        let json = r#"{
            "id": "msg_456",
            "content": [],
            "model": "test",
            "stop_reason": null,
            "usage": {"input_tokens": 0, "output_tokens": 0}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.stop_reason, None);
        assert!(resp.tool_calls().is_empty());
    }

    #[test]
    fn usage_accumulates_saturating() {
        let mut total = Usage::default();
        total.add(Usage {
            input_tokens: 10,
            output_tokens: 20,
        });
        total.add(Usage {
            input_tokens: u32::MAX,
            output_tokens: 1,
        });
        assert_eq!(total.input_tokens, u32::MAX);
        assert_eq!(total.output_tokens, 21);
    }
}
