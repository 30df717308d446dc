use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;

/// Likelihood that a text is machine-written, as reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorScore {
    #[serde(alias = "ai_percentage", alias = "score")]
    pub percentage: f64,
    #[serde(default)]
    pub flagged_passages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("detector request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("detector returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unreadable detector response: {0}")]
    Parse(String),
}

/// External machine-origin detector.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn score(&self, text: &str) -> Result<DetectorScore, DetectorError>;
}

/// Detector reached over HTTP: `POST {endpoint}` with `{"text": ...}`.
pub struct HttpDetector {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpDetector {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, DetectorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from config; `None` when no endpoint is configured.
    pub fn from_config(config: &DetectorConfig) -> Result<Option<Self>, DetectorError> {
        match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => {
                Ok(Some(Self::new(endpoint, config.api_key.clone())?))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn score(&self, text: &str) -> Result<DetectorScore, DetectorError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }));
        if !self.api_key.is_empty() {
            request = request.header("x-api-key", &self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DetectorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut score: DetectorScore =
            serde_json::from_str(&body).map_err(|e| DetectorError::Parse(e.to_string()))?;
        if !score.percentage.is_finite() {
            return Err(DetectorError::Parse(format!(
                "percentage is not a number: {}",
                score.percentage
            )));
        }
        score.percentage = score.percentage.clamp(0.0, 100.0);
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_text_and_parses_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .and(header("x-api-key", "det-key"))
            .and(body_json(serde_json::json!({"text": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ai_percentage": 42.5,
                "flagged_passages": ["hello"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let detector = HttpDetector::new(format!("{}/detect", server.uri()), "det-key").unwrap();
        let score = detector.score("hello").await.unwrap();
        assert_eq!(score.percentage, 42.5);
        assert_eq!(score.flagged_passages, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let detector = HttpDetector::new(server.uri(), "").unwrap();
        match detector.score("x").await {
            Err(DetectorError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"nope\": true}"))
            .mount(&server)
            .await;

        let detector = HttpDetector::new(server.uri(), "").unwrap();
        assert!(matches!(
            detector.score("x").await,
            Err(DetectorError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn percentage_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"percentage": 130})),
            )
            .mount(&server)
            .await;

        let detector = HttpDetector::new(server.uri(), "").unwrap();
        assert_eq!(detector.score("x").await.unwrap().percentage, 100.0);
    }

    #[test]
    fn from_config_without_endpoint_is_none() {
        assert!(HttpDetector::from_config(&DetectorConfig::default())
            .unwrap()
            .is_none());
        let config = DetectorConfig {
            endpoint: Some("http://localhost:9/detect".into()),
            api_key: String::new(),
        };
        assert!(HttpDetector::from_config(&config).unwrap().is_some());
    }
}
