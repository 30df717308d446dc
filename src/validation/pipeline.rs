use std::sync::Arc;
use std::time::Duration;

use super::detector::Detector;
use super::report::{Decision, DetectorVerdict, Issue, Severity, ValidationReport};
use super::scorer::RuleScorer;
use crate::agent::Platform;
use crate::config::ValidationConfig;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("rule scorer exceeded {limit_secs}s")]
    ScorerTimeout { limit_secs: u64 },

    #[error("rule scorer stopped: {0}")]
    ScorerAborted(#[from] tokio::task::JoinError),
}

/// Composite validation: rule scorer plus optional external detector.
///
/// Each half runs under its own timeout. The scorer is CPU-bound and runs on
/// the blocking pool so its limit can fire. The detector can only degrade the
/// report to `Unavailable`; it never fails validation.
pub struct ValidationPipeline {
    scorer: Arc<RuleScorer>,
    detector: Option<Arc<dyn Detector>>,
    pass_threshold: u32,
    scorer_timeout: Duration,
    detector_timeout: Duration,
}

impl ValidationPipeline {
    pub fn new(
        config: &ValidationConfig,
        detector: Option<Arc<dyn Detector>>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            scorer: Arc::new(RuleScorer::new(config)?),
            detector,
            pass_threshold: config.pass_threshold,
            scorer_timeout: Duration::from_secs(config.scorer_timeout_secs),
            detector_timeout: Duration::from_secs(config.detector_timeout_secs),
        })
    }

    pub fn pass_threshold(&self) -> u32 {
        self.pass_threshold
    }

    pub async fn validate(
        &self,
        text: &str,
        platform: Platform,
    ) -> Result<ValidationReport, ValidationError> {
        let scorer = Arc::clone(&self.scorer);
        let owned = text.to_string();
        let scoring = tokio::task::spawn_blocking(move || scorer.score(&owned, platform));
        let card = match tokio::time::timeout(self.scorer_timeout, scoring).await {
            Ok(joined) => joined?,
            Err(_) => {
                tracing::warn!(
                    limit_secs = self.scorer_timeout.as_secs(),
                    chars = text.len(),
                    "rule scorer timed out"
                );
                return Err(ValidationError::ScorerTimeout {
                    limit_secs: self.scorer_timeout.as_secs(),
                });
            }
        };

        let detector = self.run_detector(text).await;

        let mut issues = card.issues;
        if let DetectorVerdict::Scored {
            flagged_passages, ..
        } = &detector
        {
            issues.extend(flagged_passages.iter().map(|passage| {
                Issue::new(
                    Severity::Medium,
                    "machine_like_passage",
                    passage.clone(),
                    "Rewrite in a first-hand voice",
                )
            }));
        }

        let detector_ok = detector.percentage().is_none_or(|p| p < 100.0);
        let decision = if card.total >= self.pass_threshold && detector_ok {
            Decision::Pass
        } else {
            Decision::Revise
        };

        tracing::debug!(
            total = card.total,
            penalty = card.penalty,
            issues = issues.len(),
            ?decision,
            "validation finished"
        );

        Ok(ValidationReport {
            axes: card.axes,
            total: card.total,
            penalty: card.penalty,
            issues,
            detector,
            decision,
        })
    }

    async fn run_detector(&self, text: &str) -> DetectorVerdict {
        let Some(detector) = &self.detector else {
            return DetectorVerdict::NotConfigured;
        };
        match tokio::time::timeout(self.detector_timeout, detector.score(text)).await {
            Ok(Ok(score)) => DetectorVerdict::Scored {
                percentage: score.percentage,
                flagged_passages: score.flagged_passages,
            },
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "detector unavailable");
                DetectorVerdict::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!(
                    limit_secs = self.detector_timeout.as_secs(),
                    "detector timed out"
                );
                DetectorVerdict::Unavailable {
                    reason: format!("timed out after {}s", self.detector_timeout.as_secs()),
                }
            }
        }
    }
}
