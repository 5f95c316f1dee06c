//! Scoring fan-out
//!
//! Two independent branches run concurrently after deep analysis. Each is
//! gated by its own precondition on the user's synthesis and settles into
//! success, skipped or error without affecting its sibling.

use super::{AnalysisEvent, EventSink};
use crate::error::InferenceError;
use crate::inference::{InferenceRequest, InferenceService, InferenceTask};
use crate::prompts;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use wingman_common::models::{
    AspectCompatibility, PartnerVirtueScore, StructuredAnalysis, UserIdentity,
};

/// Which scoring branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringBranch {
    Virtue,
    Aspect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Success,
    Skipped,
    Error,
}

/// Settled result of one branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchOutcome<T> {
    Success { value: T },
    /// Precondition not met; no call was made
    Skipped { reason: String },
    /// Precondition held but the call failed
    Error { message: String },
}

impl<T> BranchOutcome<T> {
    pub fn status(&self) -> BranchStatus {
        match self {
            BranchOutcome::Success { .. } => BranchStatus::Success,
            BranchOutcome::Skipped { .. } => BranchStatus::Skipped,
            BranchOutcome::Error { .. } => BranchStatus::Error,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            BranchOutcome::Success { value } => Some(value),
            _ => None,
        }
    }

    fn skipped(reason: &str) -> Self {
        BranchOutcome::Skipped { reason: reason.to_string() }
    }
}

impl<T> From<Result<T, InferenceError>> for BranchOutcome<T> {
    fn from(result: Result<T, InferenceError>) -> Self {
        match result {
            Ok(value) => BranchOutcome::Success { value },
            Err(e) => BranchOutcome::Error { message: e.to_string() },
        }
    }
}

/// Both branches, once settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringOutcome {
    pub virtue: BranchOutcome<Vec<PartnerVirtueScore>>,
    pub aspect: BranchOutcome<AspectCompatibility>,
}

pub(super) struct Scorer<'a> {
    pub inference: &'a dyn InferenceService,
    pub events: &'a EventSink,
    pub run_id: Uuid,
    pub cancel: &'a CancellationToken,
}

impl Scorer<'_> {
    /// Run both branches to completion
    pub async fn score(
        &self,
        analysis: &StructuredAnalysis,
        identity: Option<&UserIdentity>,
    ) -> ScoringOutcome {
        let (virtue, aspect) = tokio::join!(
            self.virtue_branch(analysis, identity),
            self.aspect_branch(analysis, identity)
        );
        ScoringOutcome { virtue, aspect }
    }

    async fn virtue_branch(
        &self,
        analysis: &StructuredAnalysis,
        identity: Option<&UserIdentity>,
    ) -> BranchOutcome<Vec<PartnerVirtueScore>> {
        let synthesis = identity.and_then(|i| i.synthesis.as_ref());
        let outcome = match synthesis {
            Some(synthesis) if synthesis.has_partner_virtues() => {
                let request = InferenceRequest::new(
                    InferenceTask::VirtueScoring,
                    prompts::virtue_scoring(analysis, &synthesis.partner_virtues),
                );
                BranchOutcome::from(self.call::<Vec<PartnerVirtueScore>>(request).await)
            }
            Some(_) => BranchOutcome::skipped("no partner virtues on the user synthesis"),
            None => BranchOutcome::skipped("no user synthesis"),
        };
        self.settled(ScoringBranch::Virtue, &outcome);
        outcome
    }

    async fn aspect_branch(
        &self,
        analysis: &StructuredAnalysis,
        identity: Option<&UserIdentity>,
    ) -> BranchOutcome<AspectCompatibility> {
        let synthesis = identity.and_then(|i| i.synthesis.as_ref());
        let outcome = match synthesis.and_then(|s| s.aspect_profile.as_ref()) {
            Some(aspects) if !aspects.scores.is_empty() => {
                let request = InferenceRequest::new(
                    InferenceTask::AspectScoring,
                    prompts::aspect_scoring(analysis, aspects),
                );
                BranchOutcome::from(self.call::<AspectCompatibility>(request).await)
            }
            Some(_) => BranchOutcome::skipped("aspect profile has no scores"),
            None => BranchOutcome::skipped("no aspect profile on the user synthesis"),
        };
        self.settled(ScoringBranch::Aspect, &outcome);
        outcome
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: InferenceRequest,
    ) -> Result<T, InferenceError> {
        self.inference.infer(request, self.cancel).await?.parse()
    }

    fn settled<T>(&self, branch: ScoringBranch, outcome: &BranchOutcome<T>) {
        match outcome {
            BranchOutcome::Error { message } => {
                warn!(run_id = %self.run_id, ?branch, "Scoring branch failed: {}", message)
            }
            BranchOutcome::Skipped { reason } => {
                debug!(run_id = %self.run_id, ?branch, "Scoring branch skipped: {}", reason)
            }
            BranchOutcome::Success { .. } => debug!(run_id = %self.run_id, ?branch, "Scoring branch succeeded"),
        }
        self.events.send(AnalysisEvent::BranchSettled {
            run_id: self.run_id,
            branch,
            status: outcome.status(),
        });
    }
}
