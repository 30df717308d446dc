//! Tipos de erro para o cliente da API Anthropic.
//!
//! Define [`AnthropicError`] com variantes para rate limiting, erros da API,
//! erros de rede, timeouts e respostas ilegíveis. O método
//! [`AnthropicError::is_transient`] separa falhas que valem uma nova
//! tentativa das falhas fatais (autenticação, requisição malformada).

use std::time::Duration;

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API da Anthropic.
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// O servidor retornou HTTP 429 (rate limit).
    /// O campo `retry_after_ms` indica quantos milissegundos esperar antes de retentar.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro retornado pela API (ex.: 401 chave inválida, 500 erro interno).
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout do reqwest).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// A chamada excedeu o limite de tempo imposto pelo chamador.
    #[error("model call timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    /// O corpo da resposta não pôde ser interpretado.
    #[error("failed to parse API response: {0}")]
    ParseError(String),
}

impl AnthropicError {
    /// `true` para falhas transitórias (rede, timeout, 408/429/5xx/529).
    ///
    /// Erros 4xx restantes e respostas ilegíveis são fatais: repetir a mesma
    /// requisição não muda o resultado.
    pub fn is_transient(&self) -> bool {
        match self {
            AnthropicError::RateLimited { .. } | AnthropicError::Timeout { .. } => true,
            AnthropicError::ApiError { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529)
            }
            AnthropicError::NetworkError(e) => !e.is_decode() && !e.is_builder(),
            AnthropicError::ParseError(_) => false,
        }
    }

    /// `true` quando o erro veio de um limite de tempo.
    pub fn is_timeout(&self) -> bool {
        match self {
            AnthropicError::Timeout { .. } => true,
            AnthropicError::NetworkError(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Espera mínima pedida pelo servidor (`Retry-After`), se houver.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AnthropicError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}
