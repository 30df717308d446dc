//! Sequential batch scheduler.
//!
//! Jobs run strictly one after another, each on a fresh agent and under a
//! job-level timeout. One job's failure never stops the batch; a run of
//! consecutive failures trips a batch breaker that pauses the scheduler for
//! a cooldown before it resumes on its own.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{GenerationAgent, Platform};
use crate::anthropic::MessageSender;
use crate::config::ScriptorConfig;
use crate::orchestrator::{GeneratedContent, produce};
use crate::persist::{Notifier, Persister};
use crate::resilience::CircuitBreaker;
use crate::state_machine::{FailureKind, Job, JobFailure};
use crate::tools::ToolServices;

/// Dead-band for the score trend, in rubric points.
const TREND_DEAD_BAND: f64 = 1.0;

/// Ordered jobs plus the running tally of one scheduler run.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub id: String,
    pub jobs: Vec<Job>,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<JobResult>,
}

impl BatchPlan {
    pub fn new(jobs: Vec<Job>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            jobs,
            completed: 0,
            failed: 0,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed(Box<GeneratedContent>),
    Failed(JobFailure),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub job_id: String,
    pub platform: Platform,
    pub topic: String,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn score(&self) -> Option<u32> {
        match &self.outcome {
            JobOutcome::Completed(content) => content.score,
            JobOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match &self.outcome {
            JobOutcome::Failed(failure) => Some(failure),
            JobOutcome::Completed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Steady,
    Insufficient,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Declining => write!(f, "declining"),
            Trend::Steady => write!(f, "steady"),
            Trend::Insufficient => write!(f, "not enough scores"),
        }
    }
}

/// Compare the mean of the first half of `scores` with the second half.
pub fn trend(scores: &[u32]) -> Trend {
    if scores.len() < 2 {
        return Trend::Insufficient;
    }
    let (first, second) = scores.split_at(scores.len() / 2);
    let delta = mean(second) - mean(first);
    if delta > TREND_DEAD_BAND {
        Trend::Improving
    } else if delta < -TREND_DEAD_BAND {
        Trend::Declining
    } else {
        Trend::Steady
    }
}

fn mean(scores: &[u32]) -> f64 {
    scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len().max(1) as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
    pub average_score: Option<f64>,
    pub trend: Trend,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} completed, {} failed", self.completed, self.failed)?;
        if let Some(avg) = self.average_score {
            write!(f, ", average score {avg:.1}/25")?;
        }
        write!(f, ", trend {}", self.trend)
    }
}

/// Final report of one scheduler run. Results are in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub plan_id: String,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<JobResult>,
    pub summary: BatchSummary,
}

impl From<BatchPlan> for BatchReport {
    fn from(plan: BatchPlan) -> Self {
        let scores: Vec<u32> = plan.results.iter().filter_map(JobResult::score).collect();
        let summary = BatchSummary {
            completed: plan.completed,
            failed: plan.failed,
            average_score: (!scores.is_empty()).then(|| mean(&scores)),
            trend: trend(&scores),
        };
        Self {
            plan_id: plan.id,
            completed: plan.completed,
            failed: plan.failed,
            results: plan.results,
            summary,
        }
    }
}

/// Runs batch plans. Holds what each per-job agent is built from.
pub struct BatchScheduler<M> {
    client: Arc<M>,
    services: ToolServices,
    config: Arc<ScriptorConfig>,
    persister: Persister,
    notifier: Arc<dyn Notifier>,
}

impl<M: MessageSender> BatchScheduler<M> {
    pub fn new(
        client: Arc<M>,
        services: ToolServices,
        config: Arc<ScriptorConfig>,
        persister: Persister,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            services,
            config,
            persister,
            notifier,
        }
    }

    pub async fn run(&self, mut plan: BatchPlan) -> BatchReport {
        let settings = &self.config.batch;
        let breaker = CircuitBreaker::new(
            settings.breaker_threshold,
            Duration::from_secs(settings.cooldown_secs),
        );
        let job_timeout = Duration::from_secs(settings.job_timeout_secs);
        let jobs = std::mem::take(&mut plan.jobs);
        let total = jobs.len();

        tracing::info!(plan_id = %plan.id, total, "batch started");
        self.notify(&format!("Batch {}: starting {total} job(s)", short_id(&plan.id)))
            .await;

        for (index, job) in jobs.iter().enumerate() {
            let position = index + 1;

            while let Err(open) = breaker.try_acquire() {
                let wait = open.retry_after().max(Duration::from_secs(1));
                tracing::warn!(
                    plan_id = %plan.id,
                    failures = breaker.failure_count(),
                    wait_secs = wait.as_secs(),
                    "batch breaker open, pausing"
                );
                self.notify(&format!(
                    "Batch paused after {} consecutive failures; resuming in {}s",
                    breaker.failure_count(),
                    wait.as_secs()
                ))
                .await;
                tokio::time::sleep(wait).await;
            }

            let agent = GenerationAgent::new(
                self.client.clone(),
                self.services.clone(),
                self.config.clone(),
            );
            let produced = tokio::time::timeout(
                job_timeout,
                produce(&agent, &self.persister, job, Some(plan.id.as_str())),
            )
            .await;

            let outcome = match produced {
                Ok(Ok(content)) => {
                    breaker.record_success();
                    plan.completed += 1;
                    JobOutcome::Completed(Box::new(content))
                }
                Ok(Err(failure)) => {
                    breaker.record_failure();
                    plan.failed += 1;
                    JobOutcome::Failed(failure)
                }
                Err(_) => {
                    tracing::warn!(job_id = %job.id, limit_secs = job_timeout.as_secs(), "job timed out");
                    breaker.record_failure();
                    plan.failed += 1;
                    JobOutcome::Failed(JobFailure::new(
                        FailureKind::Timeout,
                        format!("job exceeded {}s", job_timeout.as_secs()),
                    ))
                }
            };

            let line = match &outcome {
                JobOutcome::Completed(content) => match content.score {
                    Some(score) => format!("done, score {score}/25"),
                    None => "done".to_string(),
                },
                JobOutcome::Failed(failure) => format!("failed ({failure})"),
            };
            tracing::info!(job_id = %job.id, position, total, result = %line, "batch job finished");
            self.notify(&format!("[{position}/{total}] {}: {line}", job.topic))
                .await;

            plan.results.push(JobResult {
                job_id: job.id.clone(),
                platform: job.platform,
                topic: job.topic.clone(),
                outcome,
            });

            if settings.checkpoint_every > 0
                && position % settings.checkpoint_every == 0
                && position < total
            {
                self.notify(&format!(
                    "Checkpoint {position}/{total}: {} completed, {} failed",
                    plan.completed, plan.failed
                ))
                .await;
            }
        }

        plan.jobs = jobs;
        let report = BatchReport::from(plan);
        tracing::info!(plan_id = %report.plan_id, summary = %report.summary, "batch finished");
        self.notify(&format!(
            "Batch {} finished: {}",
            short_id(&report.plan_id),
            report.summary
        ))
        .await;
        report
    }

    async fn notify(&self, text: &str) {
        let channel = self.config.notify.channel.as_deref();
        if let Err(e) = self.notifier.post_message(channel, text).await {
            tracing::warn!(error = %e, "notifier failed");
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobsFile {
    List(Vec<Job>),
    Table { jobs: Vec<Job> },
}

/// Load jobs from a JSON array, a JSON `{"jobs": [...]}` object, or a TOML
/// file with `[[jobs]]` tables.
pub fn load_jobs(path: &Path) -> Result<Vec<Job>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    let file: JobsFile = if is_toml {
        toml::from_str(&contents).with_context(|| format!("invalid jobs in {}", path.display()))?
    } else {
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid jobs in {}", path.display()))?
    };

    Ok(match file {
        JobsFile::List(jobs) | JobsFile::Table { jobs } => jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{NoopStore, StoreError};
    use crate::test_support::{Reply, ScriptedSender, offline_services, text};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn post_message(&self, _channel: Option<&str>, text: &str) -> Result<(), StoreError> {
            self.messages.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct BrokenNotifier;

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn post_message(&self, _channel: Option<&str>, _text: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("webhook gone".into()))
        }
    }

    fn scheduler(
        sender: ScriptedSender,
        config: ScriptorConfig,
        notifier: Arc<dyn Notifier>,
    ) -> (Arc<ScriptedSender>, BatchScheduler<ScriptedSender>) {
        let sender = Arc::new(sender);
        let noop = Arc::new(NoopStore);
        let scheduler = BatchScheduler::new(
            sender.clone(),
            offline_services(),
            Arc::new(config),
            Persister::new(noop.clone(), noop.clone(), noop),
            notifier,
        );
        (sender, scheduler)
    }

    fn jobs(n: usize) -> Vec<Job> {
        (1..=n)
            .map(|i| Job::new(Platform::LinkedIn, format!("topic {i}")))
            .collect()
    }

    #[test]
    fn trend_uses_halves_and_dead_band() {
        assert_eq!(trend(&[]), Trend::Insufficient);
        assert_eq!(trend(&[20]), Trend::Insufficient);
        assert_eq!(trend(&[15, 16, 19, 20]), Trend::Improving);
        assert_eq!(trend(&[22, 21, 18, 17]), Trend::Declining);
        assert_eq!(trend(&[18, 19, 19]), Trend::Steady);
    }

    #[tokio::test]
    async fn failures_are_isolated_and_order_kept() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (_, scheduler) = scheduler(
            ScriptedSender::new(vec![text("One."), Reply::Status(401), text("Three.")]),
            ScriptorConfig::default(),
            notifier.clone(),
        );
        let input = jobs(3);
        let ids: Vec<String> = input.iter().map(|j| j.id.clone()).collect();

        let report = scheduler.run(BatchPlan::new(input)).await;
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 1);
        let got: Vec<String> = report.results.iter().map(|r| r.job_id.clone()).collect();
        assert_eq!(got, ids);
        assert_eq!(
            report.results[1].failure().map(|f| &f.kind),
            Some(&FailureKind::Fatal)
        );

        let messages = notifier.messages.lock().unwrap();
        assert!(messages[1].starts_with("[1/3] topic 1: done"));
        assert!(messages[2].starts_with("[2/3] topic 2: failed"));
        assert!(messages.last().unwrap().contains("2 completed, 1 failed"));
    }

    #[tokio::test]
    async fn checkpoints_every_n_jobs() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut config = ScriptorConfig::default();
        config.batch.checkpoint_every = 2;
        let (_, scheduler) = scheduler(
            ScriptedSender::repeating(text("Post.")),
            config,
            notifier.clone(),
        );

        scheduler.run(BatchPlan::new(jobs(5))).await;
        let messages = notifier.messages.lock().unwrap();
        let checkpoints: Vec<&String> =
            messages.iter().filter(|m| m.starts_with("Checkpoint")).collect();
        assert_eq!(checkpoints.len(), 2);
        assert!(checkpoints[0].starts_with("Checkpoint 2/5"));
    }

    #[tokio::test(start_paused = true)]
    async fn batch_breaker_pauses_then_resumes() {
        let notifier = Arc::new(RecordingNotifier::default());
        let (sender, scheduler) = scheduler(
            ScriptedSender::repeating(Reply::Status(400)),
            ScriptorConfig::default(),
            notifier.clone(),
        );

        let start = Instant::now();
        let report = scheduler.run(BatchPlan::new(jobs(4))).await;

        assert_eq!(report.failed, 4);
        assert_eq!(sender.calls(), 4);
        assert!(start.elapsed() >= Duration::from_secs(60));
        let messages = notifier.messages.lock().unwrap();
        assert_eq!(
            messages.iter().filter(|m| m.starts_with("Batch paused")).count(),
            1
        );
    }

    #[tokio::test]
    async fn notifier_errors_do_not_stop_the_batch() {
        let (_, scheduler) = scheduler(
            ScriptedSender::repeating(text("Post.")),
            ScriptorConfig::default(),
            Arc::new(BrokenNotifier),
        );
        let report = scheduler.run(BatchPlan::new(jobs(2))).await;
        assert_eq!(report.completed, 2);
    }

    #[test]
    fn load_jobs_from_json_array() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"platform": "twitter", "topic": "A"}}, {{"platform": "newsletter", "topic": "B", "thinking": true}}]"#
        )
        .unwrap();
        let jobs = load_jobs(file.path()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].platform, Platform::Newsletter);
        assert!(jobs[1].thinking);
    }

    #[test]
    fn load_jobs_from_toml_tables() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[[jobs]]\nplatform = \"linkedin\"\ntopic = \"Hiring\"\npublish_date = \"2026-11-02\"\n\n[[jobs]]\nplatform = \"x\"\ntopic = \"Threads\""
        )
        .unwrap();
        let jobs = load_jobs(file.path()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].publish_date.is_some());
        assert_eq!(jobs[1].platform, Platform::Twitter);
    }

    #[test]
    fn load_jobs_reports_bad_files() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"nope\": 1}}").unwrap();
        assert!(load_jobs(file.path()).is_err());
    }
}
