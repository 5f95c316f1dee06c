//! Progressive profile analysis
//!
//! One [`AnalysisPipeline::run`] takes a media input through extraction, a
//! quick basics read, the full structured analysis and the scoring fan-out.
//! Stage changes and intermediate results are pushed to an optional event
//! channel as they happen; the returned [`AnalysisRun`] holds the outcome.
//!
//! Only extraction and the quick/deep inference calls are fatal. Scoring
//! branches settle independently and never fail the run.

mod save;
mod scoring;
mod state;

pub use save::{profile_from_run, save_analysis};
pub use scoring::{BranchOutcome, BranchStatus, ScoringBranch, ScoringOutcome};
pub use state::{AnalysisRun, RunState, StateTransition};

use crate::error::{InferenceError, PipelineError};
use crate::inference::{InferenceRequest, InferenceService, InferenceTask};
use crate::media::{Frame, MediaExtractor, ProgressCallback};
use crate::prompts;
use futures::StreamExt;
use scoring::Scorer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;
use wingman_common::config::PipelineConfig;
use wingman_common::models::{StructuredAnalysis, UserIdentity};

/// Low-latency read of the profile basics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickBasics {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub app_source: Option<String>,
    #[serde(default)]
    pub zodiac_sign: Option<String>,
}

/// Progress notification from a running analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    StateChanged(StateTransition),
    ExtractionProgress {
        run_id: Uuid,
        current: usize,
        total: usize,
    },
    /// Intermediate basics; the run continues regardless of what the receiver does
    QuickRead {
        run_id: Uuid,
        basics: QuickBasics,
    },
    BranchSettled {
        run_id: Uuid,
        branch: ScoringBranch,
        status: BranchStatus,
    },
}

/// Optional event channel; sends never block and a dropped receiver is ignored
#[derive(Clone, Default)]
pub(crate) struct EventSink(Option<mpsc::UnboundedSender<AnalysisEvent>>);

impl EventSink {
    pub(crate) fn send(&self, event: AnalysisEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Analysis orchestrator
pub struct AnalysisPipeline {
    inference: Arc<dyn InferenceService>,
    extractor: Arc<dyn MediaExtractor>,
    config: PipelineConfig,
    events: EventSink,
}

impl AnalysisPipeline {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        extractor: Arc<dyn MediaExtractor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            inference,
            extractor,
            config,
            events: EventSink::default(),
        }
    }

    /// Push stage changes and progress to `tx`
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<AnalysisEvent>) -> Self {
        self.events = EventSink(Some(tx));
        self
    }

    /// Run the full pipeline on `media`
    ///
    /// Never fails: the outcome, including any fatal error, is on the
    /// returned run. `identity` enables the compatibility block and the
    /// scoring branches.
    pub async fn run(
        &self,
        media: &Path,
        identity: Option<&UserIdentity>,
        cancel: &CancellationToken,
    ) -> AnalysisRun {
        let mut run = AnalysisRun::new();
        info!(
            run_id = %run.run_id,
            media = %media.display(),
            extractor = self.extractor.name(),
            "Starting analysis run"
        );

        if cancel.is_cancelled() {
            self.transition(&mut run, RunState::Cancelled);
            return run;
        }

        self.transition(&mut run, RunState::Extracting);
        match self.extract(&mut run, media, cancel).await {
            Ok(true) => {}
            Ok(false) => {
                info!(run_id = %run.run_id, frames = run.frames.len(), "Extraction cancelled");
                self.transition(&mut run, RunState::Cancelled);
                return run;
            }
            Err(e) => {
                self.fail(&mut run, e);
                return run;
            }
        }

        self.analyze(run, identity, cancel).await
    }

    /// Run from already-extracted frames (e.g. retrying a cancelled run)
    pub async fn run_from_frames(
        &self,
        frames: Vec<Frame>,
        identity: Option<&UserIdentity>,
        cancel: &CancellationToken,
    ) -> AnalysisRun {
        let mut run = AnalysisRun::new();

        if frames.is_empty() {
            self.fail(&mut run, PipelineError::Validation("no frames provided".to_string()));
            return run;
        }
        run.frames = frames;

        if cancel.is_cancelled() {
            self.transition(&mut run, RunState::Cancelled);
            return run;
        }

        self.analyze(run, identity, cancel).await
    }

    /// Collect frames into the run; `Ok(false)` when cancelled
    async fn extract(
        &self,
        run: &mut AnalysisRun,
        media: &Path,
        cancel: &CancellationToken,
    ) -> Result<bool, PipelineError> {
        let events = self.events.clone();
        let run_id = run.run_id;
        let progress: ProgressCallback = Arc::new(move |current, total| {
            events.send(AnalysisEvent::ExtractionProgress { run_id, current, total })
        });

        let mut frames = self.extractor.extract_frames(
            media,
            self.config.frame_interval_seconds,
            Some(progress),
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(false),
                next = frames.next() => next,
            };
            match next {
                Some(Ok(frame)) => run.frames.push(frame),
                Some(Err(e)) => return Err(PipelineError::Extraction(e.to_string())),
                None => break,
            }
        }

        if run.frames.is_empty() {
            return Err(PipelineError::Extraction(format!(
                "no frames extracted from {}",
                media.display()
            )));
        }
        info!(run_id = %run.run_id, frames = run.frames.len(), "Extraction complete");
        Ok(true)
    }

    async fn analyze(
        &self,
        mut run: AnalysisRun,
        identity: Option<&UserIdentity>,
        cancel: &CancellationToken,
    ) -> AnalysisRun {
        self.transition(&mut run, RunState::QuickAnalyzing);
        let quick_frames: Vec<Frame> = run
            .frames
            .iter()
            .take(self.config.quick_frame_count.max(1))
            .cloned()
            .collect();
        let request = InferenceRequest::new(InferenceTask::QuickRead, prompts::quick_read())
            .with_media(quick_frames);
        match self.infer::<QuickBasics>(request, cancel).await {
            Ok(basics) => {
                self.events.send(AnalysisEvent::QuickRead {
                    run_id: run.run_id,
                    basics: basics.clone(),
                });
                run.quick = Some(basics);
            }
            Err(e) => return self.interrupted(run, e),
        }

        self.transition(&mut run, RunState::DeepAnalyzing);
        let request =
            InferenceRequest::new(InferenceTask::DeepAnalysis, prompts::deep_analysis(identity))
                .with_media(run.frames.clone());
        let mut analysis = match self.infer::<StructuredAnalysis>(request, cancel).await {
            Ok(analysis) => analysis,
            Err(e) => return self.interrupted(run, e),
        };
        if let Some(quick) = &run.quick {
            fill_basics(&mut analysis, quick);
        }

        self.transition(&mut run, RunState::Scoring);
        let scorer = Scorer {
            inference: self.inference.as_ref(),
            events: &self.events,
            run_id: run.run_id,
            cancel,
        };
        let outcome = scorer.score(&analysis, identity).await;
        run.analysis = Some(analysis);
        run.scoring = Some(outcome);

        if cancel.is_cancelled() {
            self.transition(&mut run, RunState::Cancelled);
        } else {
            self.transition(&mut run, RunState::Complete);
        }
        run
    }

    async fn infer<T: DeserializeOwned>(
        &self,
        request: InferenceRequest,
        cancel: &CancellationToken,
    ) -> Result<T, InferenceError> {
        self.inference.infer(request, cancel).await?.parse()
    }

    /// Quick/deep call failed: cancellation ends the run quietly, anything else is fatal
    fn interrupted(&self, mut run: AnalysisRun, error: InferenceError) -> AnalysisRun {
        if error.is_cancelled() {
            info!(run_id = %run.run_id, stage = %run.state, "Analysis cancelled");
            self.transition(&mut run, RunState::Cancelled);
        } else {
            let stage = run.state;
            self.fail(&mut run, PipelineError::Inference { stage, source: error });
        }
        run
    }

    fn fail(&self, run: &mut AnalysisRun, error: PipelineError) {
        warn!(run_id = %run.run_id, stage = %run.state, "Analysis failed: {}", error);
        run.error = Some(error);
        self.transition(run, RunState::Error);
    }

    fn transition(&self, run: &mut AnalysisRun, state: RunState) {
        let transition = run.transition_to(state);
        info!(
            run_id = %transition.run_id,
            "Analysis {} → {}",
            transition.old_state,
            transition.new_state
        );
        self.events.send(AnalysisEvent::StateChanged(transition));
    }
}

/// Quick basics fill whatever the deep read left empty
fn fill_basics(analysis: &mut StructuredAnalysis, quick: &QuickBasics) {
    if analysis.name.is_none() {
        analysis.name = quick.name.clone();
    }
    if analysis.age.is_none() {
        analysis.age = quick.age;
    }
    if analysis.app_source.is_none() {
        analysis.app_source = quick.app_source.clone();
    }
}
