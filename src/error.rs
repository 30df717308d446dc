use thiserror::Error;

use crate::anthropic::AnthropicError;
use crate::persist::StoreError;
use crate::validation::DetectorError;

#[derive(Debug, Error)]
pub enum ScriptorError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No jobs found in {0}")]
    NoJobs(String),

    #[error("Anthropic API error: {0}")]
    Anthropic(#[from] AnthropicError),

    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid scorer pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_collaborator_errors() {
        let err: ScriptorError = StoreError::Unavailable("vector store down".into()).into();
        assert_eq!(err.to_string(), "Store error: vector store down");

        let err: ScriptorError = AnthropicError::ParseError("bad json".into()).into();
        assert!(err.to_string().starts_with("Anthropic API error:"));
    }

    #[test]
    fn toml_errors_convert() {
        let parsed: Result<toml::Value, _> = toml::from_str("= nope");
        let err: ScriptorError = parsed.unwrap_err().into();
        assert!(err.to_string().starts_with("TOML parse error:"));
    }
}
