//! Job submission client.
//!
//! Starting an ingestion job is a single request/response exchange
//! (`POST /api/ingest`). The response only acknowledges that the job was
//! accepted; progress and the final outcome arrive over the session's log
//! channel (see [`crate::channel`]).
//!
//! # Payload
//!
//! ```json
//! { "type": "repo", "source": "https://example.com/r.git", "name": "R",
//!   "language": "english", "client_id": "1718000000000" }
//! ```
//!
//! `name` and `language` are omitted when unset. `client_id` is the
//! session identifier the channel was opened with, so a backend can route
//! the job's output to that connection.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;

use crate::config::BackendConfig;
use crate::error::{Result, ViewerError};
use crate::models::{Acknowledgement, IngestRequest, SessionId, SourceKind};

/// Starts ingestion jobs on a backend.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Submits `request` for the session `session_id`.
    ///
    /// Fails with [`ViewerError::SubmissionFailed`] when the backend is
    /// unreachable or answers with a non-2xx status.
    async fn submit(&self, session_id: &SessionId, request: &IngestRequest)
        -> Result<Acknowledgement>;
}

#[derive(Serialize)]
struct IngestPayload<'a> {
    #[serde(rename = "type")]
    kind: SourceKind,
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    client_id: &'a str,
}

impl<'a> IngestPayload<'a> {
    fn new(session_id: &'a SessionId, request: &'a IngestRequest) -> Self {
        Self {
            kind: request.source_kind,
            source: &request.source,
            name: request.display_name.as_deref(),
            language: request.language.as_deref(),
            client_id: session_id.as_str(),
        }
    }
}

/// [`JobSubmitter`] backed by the HTTP ingest endpoint.
pub struct HttpJobSubmitter {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpJobSubmitter {
    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        let endpoint = config
            .base()?
            .join(&config.ingest_path)
            .context("Invalid backend.ingest_path")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl JobSubmitter for HttpJobSubmitter {
    async fn submit(
        &self,
        session_id: &SessionId,
        request: &IngestRequest,
    ) -> Result<Acknowledgement> {
        let payload = IngestPayload::new(session_id, request);

        tracing::info!(
            session = %session_id,
            kind = %request.source_kind,
            source = %request.source,
            "submitting ingestion job"
        );

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ViewerError::submission(format!("backend unreachable: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = if body.trim().is_empty() {
                format!("backend returned {}", status)
            } else {
                format!("backend returned {}: {}", status, body.trim())
            };
            return Err(ViewerError::submission(reason));
        }

        // Acceptance is the status code; the body is informational.
        let body = resp.text().await.unwrap_or_default();
        let ack = serde_json::from_str::<Acknowledgement>(&body).unwrap_or_default();
        tracing::debug!(session = %session_id, message = ?ack.message, "ingestion job accepted");
        Ok(ack)
    }
}
