//! Inference cost/outcome audit
//!
//! Wraps any [`InferenceService`] and appends one `InferenceRecord` per call.

use super::{InferenceRequest, InferenceResponse, InferenceService};
use crate::error::InferenceError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wingman_common::models::InferenceRecord;
use wingman_common::ArtifactStore;

/// Auditing [`InferenceService`] decorator
pub struct AuditedInference {
    inner: Arc<dyn InferenceService>,
    store: ArtifactStore,
}

impl AuditedInference {
    pub fn new(inner: Arc<dyn InferenceService>, store: ArtifactStore) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl InferenceService for AuditedInference {
    async fn infer(
        &self,
        request: InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<InferenceResponse, InferenceError> {
        let feature = request.task.feature();
        let started = Instant::now();
        let result = self.inner.infer(request, cancel).await;

        let mut record = InferenceRecord {
            id: 0,
            feature: feature.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            success: true,
            error: None,
            duration_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        };
        match &result {
            Ok(response) => {
                record.input_tokens = response.usage.input_tokens;
                record.output_tokens = response.usage.output_tokens;
            }
            Err(e) => {
                record.success = false;
                record.error = Some(e.to_string());
            }
        }

        match self.store.add_inference_record(&record).await {
            Ok(id) => debug!(feature, record_id = id, "Inference audited"),
            Err(e) => warn!(feature, "Failed to record inference audit: {}", e),
        }

        result
    }
}
