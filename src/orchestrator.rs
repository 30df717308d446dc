use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

use crate::agent::{GenerationAgent, Platform};
use crate::anthropic::MessageSender;
use crate::batch::{BatchPlan, BatchReport, BatchScheduler};
use crate::config::ScriptorConfig;
use crate::error::ScriptorError;
use crate::extract::extract;
use crate::persist::{DocumentStore, Embedder, NoopStore, Notifier, Persister, RecordStore};
use crate::state_machine::{Correlation, FailureKind, GenerationRecord, Job, JobFailure};
use crate::tools::ToolServices;
use crate::validation::{Detector, Issue, ValidationPipeline};

/// Single-post request, as received from a chat command or the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentRequest {
    pub topic: String,
    pub platform: Platform,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub thinking: bool,
    #[serde(default)]
    pub publish_date: Option<NaiveDate>,
    #[serde(default)]
    pub target_score: Option<u32>,
    #[serde(default)]
    pub correlation: Correlation,
}

impl CreateContentRequest {
    pub fn new(platform: Platform, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            platform,
            context: String::new(),
            style: None,
            thinking: false,
            publish_date: None,
            target_score: None,
            correlation: Correlation::default(),
        }
    }
}

impl From<CreateContentRequest> for Job {
    fn from(req: CreateContentRequest) -> Self {
        let mut job = Job::new(req.platform, req.topic)
            .with_context(req.context)
            .with_thinking(req.thinking)
            .with_correlation(req.correlation);
        if let Some(style) = req.style.filter(|s| !s.trim().is_empty()) {
            job = job.with_style(style);
        }
        if let Some(date) = req.publish_date {
            job = job.with_publish_date(date);
        }
        if let Some(target) = req.target_score {
            job.target_score = target;
        }
        job
    }
}

/// Accepted content with its validation data and where it was stored.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedContent {
    pub job_id: String,
    pub platform: Platform,
    pub content: String,
    pub preview: String,
    pub score: Option<u32>,
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector_percentage: Option<f64>,
    pub truncated: bool,
    pub links: Vec<String>,
    pub caveats: Vec<String>,
    pub record: GenerationRecord,
}

/// Result of [`ContentOrchestrator::create_content`].
///
/// Serialised flat with a `success` flag:
/// `{"success": true, "content": ..., ...}` or
/// `{"success": false, "error": "...", "kind": "timeout"}`.
#[derive(Debug, Clone)]
pub enum CreateContentResponse {
    Success(Box<GeneratedContent>),
    Failure(JobFailure),
}

impl CreateContentResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, CreateContentResponse::Success(_))
    }
}

#[derive(Serialize)]
struct Flagged<'a, T> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    error: &'a str,
    #[serde(flatten)]
    kind: &'a FailureKind,
}

impl Serialize for CreateContentResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CreateContentResponse::Success(content) => Flagged {
                success: true,
                body: content.as_ref(),
            }
            .serialize(serializer),
            CreateContentResponse::Failure(failure) => Flagged {
                success: false,
                body: &FailureBody {
                    error: &failure.message,
                    kind: &failure.kind,
                },
            }
            .serialize(serializer),
        }
    }
}

/// External collaborators the orchestrator is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub embedder: Arc<dyn Embedder>,
    pub documents: Arc<dyn DocumentStore>,
    pub notifier: Arc<dyn Notifier>,
    pub detector: Option<Arc<dyn Detector>>,
}

impl Collaborators {
    /// No persistence, no notices, no detector.
    pub fn offline() -> Self {
        let noop = Arc::new(NoopStore);
        Self {
            records: noop.clone(),
            embedder: noop.clone(),
            documents: noop.clone(),
            notifier: noop,
            detector: None,
        }
    }
}

/// Entry point for single posts and batches.
pub struct ContentOrchestrator<M> {
    agent: GenerationAgent<M>,
    scheduler: BatchScheduler<M>,
    persister: Persister,
    notifier: Arc<dyn Notifier>,
}

impl<M: MessageSender> ContentOrchestrator<M> {
    pub fn new(
        client: Arc<M>,
        config: Arc<ScriptorConfig>,
        collaborators: Collaborators,
    ) -> Result<Self, ScriptorError> {
        let validation = ValidationPipeline::new(&config.validation, collaborators.detector)?;
        let services = ToolServices {
            validation: Arc::new(validation),
            embedder: collaborators.embedder.clone(),
            documents: collaborators.documents.clone(),
        };
        let persister = Persister::new(
            collaborators.records,
            collaborators.embedder,
            collaborators.documents,
        );
        let agent = GenerationAgent::new(client.clone(), services.clone(), config.clone());
        let scheduler = BatchScheduler::new(
            client,
            services,
            config,
            persister.clone(),
            collaborators.notifier.clone(),
        );
        Ok(Self {
            agent,
            scheduler,
            persister,
            notifier: collaborators.notifier,
        })
    }

    /// The long-lived agent used for single posts. Its breaker spans calls.
    pub fn agent(&self) -> &GenerationAgent<M> {
        &self.agent
    }

    pub async fn create_content(&self, request: CreateContentRequest) -> CreateContentResponse {
        let job = Job::from(request);
        tracing::info!(job_id = %job.id, platform = %job.platform, "create_content");

        match produce(&self.agent, &self.persister, &job, None).await {
            Ok(content) => {
                if let Some(channel) = job.correlation.channel_id.as_deref() {
                    let notice = format!("{} draft ready: {}", job.platform, content.preview);
                    if let Err(e) = self.notifier.post_message(Some(channel), &notice).await {
                        tracing::warn!(error = %e, "notifier failed");
                    }
                }
                CreateContentResponse::Success(Box::new(content))
            }
            Err(failure) => CreateContentResponse::Failure(failure),
        }
    }

    pub async fn run_batch(&self, jobs: Vec<Job>) -> BatchReport {
        self.scheduler.run(BatchPlan::new(jobs)).await
    }
}

/// Generate, extract and persist one job.
///
/// Scores and issues the model left out of its final text are filled in from
/// the last `validate_content` report of the run.
pub async fn produce<M: MessageSender>(
    agent: &GenerationAgent<M>,
    persister: &Persister,
    job: &Job,
    batch_id: Option<&str>,
) -> Result<GeneratedContent, JobFailure> {
    let run = agent
        .run_scoped(job, batch_id)
        .await
        .map_err(|failed| failed.failure)?;

    let mut extracted = extract(&run.text);
    if let Some(report) = &run.last_report {
        extracted.score.get_or_insert(report.total);
        if extracted.issues.is_empty() {
            extracted.issues = report.issues.clone();
        }
        if extracted.detector_percentage.is_none() {
            extracted.detector_percentage = report.detector.percentage();
        }
    }

    let outcome = persister.persist(job, &extracted, batch_id).await;
    let mut caveats = outcome.caveats;
    if run.truncated {
        caveats.insert(0, "output hit the token limit and may be cut off".to_string());
    }

    Ok(GeneratedContent {
        job_id: job.id.clone(),
        platform: job.platform,
        content: extracted.content,
        preview: extracted.preview,
        score: extracted.score,
        issues: extracted.issues,
        detector_percentage: extracted.detector_percentage,
        truncated: run.truncated,
        links: outcome.links,
        caveats,
        record: run.record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{NewRecord, RecordRef, StoreError};
    use crate::test_support::{Reply, ScriptedSender, text, tool};
    use async_trait::async_trait;
    use serde_json::json;

    struct DownStore;

    #[async_trait]
    impl RecordStore for DownStore {
        async fn create_record(&self, _record: &NewRecord) -> Result<RecordRef, StoreError> {
            Err(StoreError::Unavailable("calendar offline".into()))
        }
    }

    struct LinkingStore;

    #[async_trait]
    impl RecordStore for LinkingStore {
        async fn create_record(&self, _record: &NewRecord) -> Result<RecordRef, StoreError> {
            Ok(RecordRef {
                id: "rec_1".into(),
                url: Some("https://calendar.example/rec_1".into()),
            })
        }
    }

    fn orchestrator(
        replies: Vec<Reply>,
        collaborators: Collaborators,
    ) -> ContentOrchestrator<ScriptedSender> {
        ContentOrchestrator::new(
            Arc::new(ScriptedSender::new(replies)),
            Arc::new(ScriptorConfig::default()),
            collaborators,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn success_uses_embedded_metadata() {
        let raw = "Shipping beats polishing.\n\n```json\n{\"score\": 21, \"issues\": [\"weak close\"]}\n```";
        let orch = orchestrator(vec![text(raw)], Collaborators::offline());

        let response = orch
            .create_content(CreateContentRequest::new(Platform::LinkedIn, "shipping"))
            .await;
        let CreateContentResponse::Success(content) = response else {
            panic!("expected success");
        };
        assert_eq!(content.content, "Shipping beats polishing.");
        assert_eq!(content.score, Some(21));
        assert_eq!(content.issues.len(), 1);
        assert!(content.caveats.is_empty());
    }

    #[tokio::test]
    async fn score_falls_back_to_last_validation() {
        let draft = "In 2025 our team at Acme cut deploy time from 40 to 9 minutes.";
        let orch = orchestrator(
            vec![
                tool("t1", "validate_content", json!({ "content": draft })),
                text(draft),
            ],
            Collaborators::offline(),
        );

        let response = orch
            .create_content(CreateContentRequest::new(Platform::LinkedIn, "deploys"))
            .await;
        let CreateContentResponse::Success(content) = response else {
            panic!("expected success");
        };
        assert!(content.score.is_some());
        assert_eq!(content.record.tools.validate_content, 1);
    }

    #[tokio::test]
    async fn persistence_failure_becomes_caveat() {
        let mut collaborators = Collaborators::offline();
        collaborators.records = Arc::new(DownStore);
        let orch = orchestrator(vec![text("Post body.")], collaborators);

        let response = orch
            .create_content(CreateContentRequest::new(Platform::Threads, "notes"))
            .await;
        let CreateContentResponse::Success(content) = response else {
            panic!("expected success");
        };
        assert_eq!(content.content, "Post body.");
        assert_eq!(content.caveats.len(), 1);
        assert!(content.caveats[0].contains("calendar offline"));
    }

    #[tokio::test]
    async fn record_url_is_linked() {
        let mut collaborators = Collaborators::offline();
        collaborators.records = Arc::new(LinkingStore);
        let orch = orchestrator(vec![text("Post body.")], collaborators);

        let response = orch
            .create_content(CreateContentRequest::new(Platform::Instagram, "launch"))
            .await;
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["links"][0], "https://calendar.example/rec_1");
        assert_eq!(json["content"], "Post body.");
    }

    #[tokio::test]
    async fn truncated_output_is_flagged() {
        let orch = orchestrator(
            vec![Reply::Truncated("A long post that".into())],
            Collaborators::offline(),
        );
        let response = orch
            .create_content(CreateContentRequest::new(Platform::Newsletter, "recap"))
            .await;
        let CreateContentResponse::Success(content) = response else {
            panic!("expected success");
        };
        assert!(content.truncated);
        assert!(content.caveats[0].contains("token limit"));
    }

    #[tokio::test]
    async fn failure_serializes_with_kind() {
        let orch = orchestrator(vec![Reply::Status(401)], Collaborators::offline());
        let response = orch
            .create_content(CreateContentRequest::new(Platform::Twitter, "anything"))
            .await;
        assert!(!response.is_success());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["kind"], "fatal");
        assert!(json["error"].as_str().unwrap().contains("401"));
    }

    #[test]
    fn request_maps_onto_job() {
        let req: CreateContentRequest = serde_json::from_value(json!({
            "topic": "Rust in prod",
            "platform": "youtube",
            "style": "  ",
            "thinking": true,
            "target_score": 20
        }))
        .unwrap();
        let job = Job::from(req);
        assert_eq!(job.platform, Platform::YoutubeShort);
        assert_eq!(job.style, "default");
        assert!(job.thinking);
        assert_eq!(job.target_score, 20);
    }
}
