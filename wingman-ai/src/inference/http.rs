//! HTTP inference client
//!
//! Posts `{model, task, prompt, media[]}` JSON (frames base64-encoded) to the
//! configured endpoint and expects `{payload, usage}` back.

use super::{cancellable, InferenceRequest, InferenceResponse, InferenceService};
use crate::error::InferenceError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use wingman_common::config::InferenceConfig;

const USER_AGENT: &str = concat!("wingman/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct MediaPart<'a> {
    mime: &'a str,
    data: String,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    task: &'a str,
    prompt: &'a str,
    media: Vec<MediaPart<'a>>,
}

/// [`InferenceService`] over HTTP
pub struct HttpInferenceService {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpInferenceService {
    pub fn new(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| InferenceError::Failed(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn send(&self, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let body = RequestBody {
            model: &self.model,
            task: request.task.feature(),
            prompt: &request.prompt,
            media: request
                .media
                .iter()
                .map(|frame| MediaPart {
                    mime: &frame.mime,
                    data: STANDARD.encode(&frame.bytes),
                })
                .collect(),
        };

        let mut builder = self.http_client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(task = %request.task, frames = request.media.len(), "Sending inference request");

        let response = builder
            .send()
            .await
            .map_err(|e| InferenceError::Failed(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::Failed(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        response
            .json::<InferenceResponse>()
            .await
            .map_err(|e| InferenceError::Unparseable(e.to_string()))
    }
}

#[async_trait]
impl InferenceService for HttpInferenceService {
    async fn infer(
        &self,
        request: InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<InferenceResponse, InferenceError> {
        cancellable(cancel, self.send(&request)).await
    }
}
