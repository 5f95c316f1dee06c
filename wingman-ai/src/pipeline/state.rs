//! Analysis run state machine
//!
//! Idle → Extracting → QuickAnalyzing → DeepAnalyzing → Scoring → Complete,
//! with Error reachable from any non-terminal state and Cancelled from any
//! state that has not already finished.

use super::{QuickBasics, ScoringOutcome};
use crate::error::PipelineError;
use crate::media::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use wingman_common::models::StructuredAnalysis;

/// Stage of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    /// Capturing still frames from the media
    Extracting,
    /// Low-latency basics read
    QuickAnalyzing,
    /// Full structured analysis
    DeepAnalyzing,
    /// Virtue and aspect branches in flight
    Scoring,
    Complete,
    Error,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Error | RunState::Cancelled)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Extracting)
            | (Extracting, QuickAnalyzing)
            | (QuickAnalyzing, DeepAnalyzing)
            | (DeepAnalyzing, Scoring)
            | (Scoring, Complete) => true,
            // Frames handed in directly skip extraction
            (Idle, QuickAnalyzing) => true,
            (from, Error) => !from.is_terminal(),
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Extracting => "Extracting",
            RunState::QuickAnalyzing => "QuickAnalyzing",
            RunState::DeepAnalyzing => "DeepAnalyzing",
            RunState::Scoring => "Scoring",
            RunState::Complete => "Complete",
            RunState::Error => "Error",
            RunState::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// One analysis run and everything it has produced so far
///
/// Frames stay on the run whatever the outcome, so a cancelled or failed run
/// can be retried without re-extracting.
#[derive(Debug)]
pub struct AnalysisRun {
    pub run_id: Uuid,
    pub state: RunState,
    pub frames: Vec<Frame>,
    pub quick: Option<QuickBasics>,
    pub analysis: Option<StructuredAnalysis>,
    pub scoring: Option<ScoringOutcome>,
    /// Set only when `state` is [`RunState::Error`]
    pub error: Option<PipelineError>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Default for AnalysisRun {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Idle,
            frames: Vec::new(),
            quick: None,
            analysis: None,
            scoring: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        debug_assert!(
            self.state.can_transition_to(new_state),
            "illegal transition {} -> {}",
            self.state,
            new_state
        );
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        transition
    }

    /// Finished with a structured analysis
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Complete && self.analysis.is_some()
    }
}
