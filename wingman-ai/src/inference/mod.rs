//! External inference boundary
//!
//! The core only needs three things from the service: a well-formed payload
//! for the requested task or an error, a distinguishable cancelled error, and
//! no internal timeout. Transport lives in the implementations
//! ([`HttpInferenceService`]), auditing in [`AuditedInference`].

mod audited;
mod http;

pub use audited::AuditedInference;
pub use http::HttpInferenceService;

use crate::error::InferenceError;
use crate::media::Frame;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// What the service is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceTask {
    /// Low-latency name/age/app read from the first frames
    QuickRead,
    /// Full structured profile analysis
    DeepAnalysis,
    /// Match scored against the user's partner virtues
    VirtueScoring,
    /// Match scored on the legacy 23-aspect model
    AspectScoring,
    /// 11-virtue compatibility between user and match
    Virtues11,
    Zodiac,
    DateIdeas,
}

impl InferenceTask {
    /// Feature tag recorded in the inference audit
    pub fn feature(&self) -> &'static str {
        match self {
            InferenceTask::QuickRead => "quick_read",
            InferenceTask::DeepAnalysis => "deep_analysis",
            InferenceTask::VirtueScoring => "virtue_scoring",
            InferenceTask::AspectScoring => "aspect_scoring",
            InferenceTask::Virtues11 => "virtues11",
            InferenceTask::Zodiac => "zodiac",
            InferenceTask::DateIdeas => "date_ideas",
        }
    }
}

impl fmt::Display for InferenceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feature())
    }
}

/// One inference call
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub task: InferenceTask,
    pub prompt: String,
    pub media: Vec<Frame>,
}

impl InferenceRequest {
    pub fn new(task: InferenceTask, prompt: impl Into<String>) -> Self {
        Self {
            task,
            prompt: prompt.into(),
            media: Vec::new(),
        }
    }

    pub fn with_media(mut self, media: Vec<Frame>) -> Self {
        self.media = media;
        self
    }
}

/// Token accounting reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Structured answer for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub payload: Value,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl InferenceResponse {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            usage: TokenUsage::default(),
        }
    }

    /// Decode the payload as the artifact the task asked for
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, InferenceError> {
        parse_payload(&self.payload)
    }
}

/// Decode a payload, mapping shape mismatches to [`InferenceError::Unparseable`]
pub fn parse_payload<T: DeserializeOwned>(payload: &Value) -> Result<T, InferenceError> {
    T::deserialize(payload).map_err(|e| InferenceError::Unparseable(e.to_string()))
}

/// The external inference service
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Run one request
    ///
    /// Must return [`InferenceError::Cancelled`] promptly once `cancel` fires.
    async fn infer(
        &self,
        request: InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<InferenceResponse, InferenceError>;
}

/// Race `future` against `cancel`
///
/// An already-cancelled token wins without polling the future.
pub async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T, InferenceError>
where
    F: Future<Output = Result<T, InferenceError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InferenceError::Cancelled),
        result = future => result,
    }
}
