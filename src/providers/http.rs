/*!
 * HTTP translator.
 *
 * Posts each chunk to a remote translation agent:
 *
 * ```json
 * {"chunk_id": 2, "attempt": 1, "chunk": "<chunk file>", "context": "<context.md>",
 *  "settings": {"target_language": "fr"}, "previous_failure": null}
 * ```
 *
 * and expects `{"chunk": "<chunk file>", "amendment": {"terms": [...]}}` back.
 * 401 and 403 abort the run; every other failure counts as an attempt.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::context::ContextAmendment;
use crate::errors::TranslatorError;

use super::{TranslationRequest, TranslationResponse, TranslationSettings, Translator};

/// Request body sent to the remote agent
#[derive(Debug, Serialize)]
struct ChunkPayload<'a> {
    chunk_id: usize,
    attempt: u32,
    chunk: String,
    context: String,
    settings: &'a TranslationSettings,
    previous_failure: Option<String>,
}

/// Response body expected from the remote agent
#[derive(Debug, Deserialize)]
struct ChunkReply {
    chunk: String,
    #[serde(default)]
    amendment: Option<ContextAmendment>,
}

/// Translator backed by a remote HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpTranslator {
    /// Create a translator posting to `endpoint`
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Result<Self, TranslatorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| TranslatorError::Unrecoverable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.filter(|key| !key.is_empty()),
            client,
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<TranslationResponse, TranslatorError> {
        let payload = ChunkPayload {
            chunk_id: request.chunk.id,
            attempt: request.attempt,
            chunk: request.chunk.to_chunk_file(),
            context: request.context.render(),
            settings: request.settings,
            previous_failure: request.previous_failure.map(|f| f.to_string()),
        };

        let mut builder = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!("Posting chunk {} to {}", request.chunk.id, self.endpoint);
        let response = builder
            .send()
            .await
            .map_err(|e| TranslatorError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Translator endpoint error ({}): {}", status, message);
            return Err(TranslatorError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let reply = response
            .json::<ChunkReply>()
            .await
            .map_err(|e| TranslatorError::ParseError(format!("Invalid translator reply: {}", e)))?;

        TranslationResponse::from_chunk_text(&reply.chunk, reply.amendment)
    }

    fn name(&self) -> &str {
        "http"
    }
}
