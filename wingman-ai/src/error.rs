//! Error types for wingman-ai
//!
//! - [`InferenceError`]: the external inference boundary failed
//! - [`PipelineError`]: an analysis run could not produce a structured result
//! - [`CacheError`]: a generated artifact could not be produced; a value held
//!   in cache state, never returned from `generate()`

use crate::pipeline::RunState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure of one inference call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// The caller's cancellation token fired before a response arrived
    #[error("Inference cancelled")]
    Cancelled,

    /// Transport or service-side failure
    #[error("Inference failed: {0}")]
    Failed(String),

    /// The service answered but the payload did not match the requested task
    #[error("Unparseable inference output: {0}")]
    Unparseable(String),
}

impl InferenceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, InferenceError::Cancelled)
    }
}

/// Fatal failure of an analysis run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable frames could be extracted from the media
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Input rejected before any external call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Quick or deep analysis failed; the raw cause is kept as the source
    #[error("Inference failed during {stage}: {source}")]
    Inference {
        stage: RunState,
        #[source]
        source: InferenceError,
    },

    /// Saving the result failed
    #[error("Store error: {0}")]
    Store(#[from] wingman_common::Error),
}

/// What kind of failure a cache generation hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheErrorCategory {
    /// Profile or identity could not be read, or the artifact not saved
    Store,
    /// The inference call failed
    Inference,
    /// The inference answer could not be read as the artifact
    Unparseable,
    /// The generation was cancelled
    Cancelled,
}

/// Structured generation failure shown next to the artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheError {
    pub category: CacheErrorCategory,
    pub message: String,
}

impl CacheError {
    pub fn new(category: CacheErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.category, self.message)
    }
}

impl From<InferenceError> for CacheError {
    fn from(error: InferenceError) -> Self {
        let category = match &error {
            InferenceError::Cancelled => CacheErrorCategory::Cancelled,
            InferenceError::Failed(_) => CacheErrorCategory::Inference,
            InferenceError::Unparseable(_) => CacheErrorCategory::Unparseable,
        };
        CacheError::new(category, error.to_string())
    }
}

impl From<wingman_common::Error> for CacheError {
    fn from(error: wingman_common::Error) -> Self {
        CacheError::new(CacheErrorCategory::Store, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_inference_error_preserved_as_source() {
        let error = PipelineError::Inference {
            stage: RunState::DeepAnalyzing,
            source: InferenceError::Failed("HTTP 502".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "Inference failed during DeepAnalyzing: Inference failed: HTTP 502"
        );
        assert_eq!(
            error.source().map(|s| s.to_string()),
            Some("Inference failed: HTTP 502".to_string())
        );
    }

    #[test]
    fn test_cache_error_categories() {
        assert_eq!(
            CacheError::from(InferenceError::Cancelled).category,
            CacheErrorCategory::Cancelled
        );
        assert_eq!(
            CacheError::from(InferenceError::Unparseable("x".to_string())).category,
            CacheErrorCategory::Unparseable
        );
        let store: CacheError = wingman_common::Error::NotFound("match profile 3".to_string()).into();
        assert_eq!(store.category, CacheErrorCategory::Store);
    }
}
