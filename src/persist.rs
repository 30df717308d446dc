//! External collaborators (record store, document store, embedder, notifier)
//! and the persistence step that runs after a successful generation.
//!
//! Persistence never fails a job: every collaborator error becomes a caveat
//! attached to the otherwise successful result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::agent::Platform;
use crate::extract::ExtractedContent;
use crate::state_machine::{Correlation, Job};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Unavailable(String),
}

/// Row written to the content calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRecord {
    pub content: String,
    pub platform: Platform,
    pub status: String,
    pub notes: String,
    pub publish_date: Option<NaiveDate>,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordRef {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_record(&self, record: &NewRecord) -> Result<RecordRef, StoreError>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub platform: Platform,
    pub job_id: String,
    /// Batch that produced the document, if any.
    pub batch_id: Option<String>,
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub platform: Platform,
    /// Excludes documents written by this batch so jobs never see each other.
    pub exclude_batch: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHit {
    pub id: String,
    pub content: String,
    pub similarity: f32,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(
        &self,
        content: &str,
        metadata: &DocumentMetadata,
        embedding: &[f32],
    ) -> Result<String, StoreError>;

    async fn search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
    ) -> Result<Vec<DocumentHit>, StoreError>;
}

/// User-visible progress channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post_message(&self, channel: Option<&str>, text: &str) -> Result<(), StoreError>;
}

/// Implements every collaborator trait as a silent no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

#[async_trait]
impl RecordStore for NoopStore {
    async fn create_record(&self, _record: &NewRecord) -> Result<RecordRef, StoreError> {
        Ok(RecordRef {
            id: String::new(),
            url: None,
        })
    }
}

#[async_trait]
impl Embedder for NoopStore {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, StoreError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl DocumentStore for NoopStore {
    async fn insert(
        &self,
        _content: &str,
        _metadata: &DocumentMetadata,
        _embedding: &[f32],
    ) -> Result<String, StoreError> {
        Ok(String::new())
    }

    async fn search(
        &self,
        _embedding: &[f32],
        _filter: &SearchFilter,
    ) -> Result<Vec<DocumentHit>, StoreError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl Notifier for NoopStore {
    async fn post_message(&self, _channel: Option<&str>, _text: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Slack-compatible incoming webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn post_message(&self, channel: Option<&str>, text: &str) -> Result<(), StoreError> {
        let mut body = serde_json::json!({ "text": text });
        if let Some(channel) = channel {
            body["channel"] = serde_json::Value::String(channel.to_string());
        }
        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Links and caveats gathered while persisting one result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistOutcome {
    pub record_id: Option<String>,
    pub document_id: Option<String>,
    pub links: Vec<String>,
    pub caveats: Vec<String>,
}

/// Writes accepted content to the record store and the document store.
#[derive(Clone)]
pub struct Persister {
    records: Arc<dyn RecordStore>,
    embedder: Arc<dyn Embedder>,
    documents: Arc<dyn DocumentStore>,
}

impl Persister {
    pub fn new(
        records: Arc<dyn RecordStore>,
        embedder: Arc<dyn Embedder>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            records,
            embedder,
            documents,
        }
    }

    pub async fn persist(
        &self,
        job: &Job,
        extracted: &ExtractedContent,
        batch_id: Option<&str>,
    ) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();

        let record = NewRecord {
            content: extracted.content.clone(),
            platform: job.platform,
            status: if job.publish_date.is_some() {
                "scheduled".to_string()
            } else {
                "draft".to_string()
            },
            notes: record_notes(extracted),
            publish_date: job.publish_date,
            correlation: job.correlation.clone(),
        };
        match self.records.create_record(&record).await {
            Ok(created) => {
                if !created.id.is_empty() {
                    outcome.record_id = Some(created.id);
                }
                outcome.links.extend(created.url);
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "record store write failed");
                outcome.caveats.push(format!("record not saved: {e}"));
            }
        }

        let embedding = match self.embedder.embed(&extracted.content).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "embedding failed");
                outcome.caveats.push(format!("not indexed for search: {e}"));
                return outcome;
            }
        };

        let metadata = DocumentMetadata {
            platform: job.platform,
            job_id: job.id.clone(),
            batch_id: batch_id.map(str::to_string),
            score: extracted.score,
        };
        match self
            .documents
            .insert(&extracted.content, &metadata, &embedding)
            .await
        {
            Ok(id) if !id.is_empty() => outcome.document_id = Some(id),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "document store write failed");
                outcome.caveats.push(format!("not indexed for search: {e}"));
            }
        }

        outcome
    }
}

fn record_notes(extracted: &ExtractedContent) -> String {
    let mut notes = match extracted.score {
        Some(score) => format!("score {score}/25"),
        None => "score n/a".to_string(),
    };
    if !extracted.issues.is_empty() {
        notes.push_str(&format!(", {} issue(s)", extracted.issues.len()));
    }
    if let Some(pct) = extracted.detector_percentage {
        notes.push_str(&format!(", detector {pct:.0}%"));
    }
    notes
}
