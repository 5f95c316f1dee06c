//! Scripted inference service and in-memory frame source

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wingman_ai::error::InferenceError;
use wingman_ai::inference::{
    cancellable, InferenceRequest, InferenceResponse, InferenceService, InferenceTask,
};
use wingman_ai::media::{Frame, FrameStream, MediaExtractor, ProgressCallback};

/// How the scripted service answers one task
#[derive(Debug, Clone)]
pub enum Behavior {
    Respond(Value),
    Fail(String),
    /// Block until the caller's token fires
    HangUntilCancelled,
    /// Answer after a delay (still cancellable)
    Delayed(Duration, Value),
}

/// Per-task scripted [`InferenceService`] that counts calls
#[derive(Default)]
pub struct ScriptedInference {
    script: Mutex<HashMap<InferenceTask, Behavior>>,
    calls: Mutex<HashMap<InferenceTask, usize>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, task: InferenceTask, behavior: Behavior) -> Self {
        self.set(task, behavior);
        self
    }

    /// Change a task's behavior mid-test
    pub fn set(&self, task: InferenceTask, behavior: Behavior) {
        self.script.lock().unwrap().insert(task, behavior);
    }

    pub fn calls(&self, task: InferenceTask) -> usize {
        self.calls.lock().unwrap().get(&task).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl InferenceService for ScriptedInference {
    async fn infer(
        &self,
        request: InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<InferenceResponse, InferenceError> {
        *self.calls.lock().unwrap().entry(request.task).or_insert(0) += 1;
        let behavior = self.script.lock().unwrap().get(&request.task).cloned();

        match behavior {
            Some(Behavior::Respond(payload)) => Ok(InferenceResponse::new(payload)),
            Some(Behavior::Fail(message)) => Err(InferenceError::Failed(message)),
            Some(Behavior::HangUntilCancelled) => {
                cancel.cancelled().await;
                Err(InferenceError::Cancelled)
            }
            Some(Behavior::Delayed(delay, payload)) => {
                cancellable(cancel, async move {
                    tokio::time::sleep(delay).await;
                    Ok(InferenceResponse::new(payload))
                })
                .await
            }
            None => Err(InferenceError::Failed(format!("no script for {}", request.task))),
        }
    }
}

/// [`MediaExtractor`] yielding a fixed frame list, whatever the path
pub struct StaticFrames {
    frames: Vec<Frame>,
    extractions: AtomicUsize,
}

impl StaticFrames {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            extractions: AtomicUsize::new(0),
        }
    }

    pub fn extractions(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

impl MediaExtractor for StaticFrames {
    fn name(&self) -> &'static str {
        "static"
    }

    fn extract_frames<'a>(
        &'a self,
        _media: &'a Path,
        _interval_seconds: f64,
        on_progress: Option<ProgressCallback>,
    ) -> FrameStream<'a> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        let total = self.frames.len();
        futures::stream::iter(self.frames.clone().into_iter().map(move |frame| {
            if let Some(progress) = &on_progress {
                progress(frame.index + 1, total);
            }
            Ok(frame)
        }))
        .boxed()
    }
}
