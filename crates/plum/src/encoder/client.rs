//! HTTP client for a MusicVAE model server.
//!
//! The server takes MIDI files, converts them to model inputs with the
//! model's own data converter, and answers with one `z` per file.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use midi_prep::{sequence_to_midi, NoteSequence};
use plumconf::ModelConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EncodeError, LatentEncoder, LatentVector};

#[derive(Serialize)]
struct EncodeRequest<'a> {
    model: &'a str,
    midi: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_size: Option<u32>,
}

#[derive(Deserialize)]
struct EncodeResponse {
    z: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    message: Option<String>,
}

pub struct MusicVaeClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    checkpoint: Option<String>,
    batch_size: Option<u32>,
}

impl MusicVaeClient {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self, EncodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EncodeError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            checkpoint: None,
            batch_size: None,
        })
    }

    pub fn from_config(config: &ModelConfig, model: impl Into<String>) -> Result<Self, EncodeError> {
        Ok(Self::new(
            &config.encoder_url,
            model,
            Duration::from_secs(config.timeout_secs),
        )?
        .with_batch_size(config.batch_size))
    }

    /// Batch size the server builds the model with.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Point the server at a checkpoint on its own filesystem.
    pub fn with_checkpoint(mut self, checkpoint: impl Into<String>) -> Self {
        self.checkpoint = Some(checkpoint.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fails when the server cannot be reached or reports unhealthy.
    pub async fn health(&self) -> Result<(), EncodeError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EncodeError::Other(format!("encoder unreachable at {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(EncodeError::Other(format!(
                "encoder health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn classify_rejection(body: &str) -> EncodeError {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) => match err.error.as_str() {
                "no_extracted_examples" => EncodeError::NoExtractedExamples,
                "multiple_extracted_examples" => EncodeError::MultipleExtractedExamples,
                other => EncodeError::Other(match err.message {
                    Some(message) => format!("{other}: {message}"),
                    None => other.to_string(),
                }),
            },
            Err(_) => EncodeError::Other(format!("encoder rejected input: {body}")),
        }
    }
}

#[async_trait]
impl LatentEncoder for MusicVaeClient {
    async fn encode(&self, sequences: &[NoteSequence]) -> Result<Vec<LatentVector>, EncodeError> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }

        let request = EncodeRequest {
            model: &self.model,
            midi: sequences
                .iter()
                .map(|seq| BASE64.encode(sequence_to_midi(seq)))
                .collect(),
            checkpoint: self.checkpoint.as_deref(),
            batch_size: self.batch_size,
        };

        let url = format!("{}/encode", self.base_url);
        tracing::debug!(model = %self.model, count = sequences.len(), "encoding sequences");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EncodeError::Other(format!("encode request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_rejection(&body));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(
                retry_after = ?retry_after,
                error_body = %error_body,
                "encoder busy"
            );
            return Err(EncodeError::Other(format!(
                "encoder busy (429), retry after {}",
                retry_after.as_deref().unwrap_or("unknown")
            )));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EncodeError::Other(format!(
                "encoder error {status}: {error_body}"
            )));
        }

        let body: EncodeResponse = response
            .json()
            .await
            .map_err(|e| EncodeError::Other(format!("invalid encoder response: {e}")))?;

        if body.z.len() != sequences.len() {
            return Err(EncodeError::Other(format!(
                "encoder returned {} vectors for {} sequences",
                body.z.len(),
                sequences.len()
            )));
        }

        Ok(body.z.into_iter().map(LatentVector).collect())
    }
}
