//! Persisting a finished run as a match profile

use super::{AnalysisRun, RunState};
use crate::error::PipelineError;
use tracing::info;
use wingman_common::models::{AnalysisPhase, MatchProfile, ProfileAnalysis};
use wingman_common::ArtifactStore;

/// Build the profile a run would save
///
/// Requires a structured analysis; scoring results are attached only for
/// branches that succeeded. A run cut short after deep analysis is saved at
/// the `deep` phase so generation can fill in the rest later.
pub fn profile_from_run(run: &AnalysisRun) -> Result<MatchProfile, PipelineError> {
    if run.state == RunState::Error {
        return Err(PipelineError::Validation("run ended in error".to_string()));
    }
    let analysis = run.analysis.as_ref().ok_or_else(|| {
        PipelineError::Validation("run has no structured analysis to save".to_string())
    })?;

    let phase = if run.state == RunState::Complete {
        AnalysisPhase::Complete
    } else {
        AnalysisPhase::Deep
    };
    let quick = run.quick.clone().unwrap_or_default();

    let mut profile = MatchProfile::new(
        analysis
            .name
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        ProfileAnalysis::Structured(analysis.clone()),
        phase,
    );
    profile.age = analysis.age;
    profile.app_source = analysis.app_source.clone();
    profile.zodiac_sign = quick.zodiac_sign;
    profile.compatibility = analysis.compatibility.clone();
    profile.thumbnail = run.frames.first().map(|frame| frame.bytes.clone());

    if let Some(scoring) = &run.scoring {
        profile.virtue_scores = scoring.virtue.value().cloned();
        profile.aspect_scores = scoring.aspect.value().cloned();
    }

    Ok(profile)
}

/// Save a run's result; returns the new profile id
pub async fn save_analysis(store: &ArtifactStore, run: &AnalysisRun) -> Result<i64, PipelineError> {
    let profile = profile_from_run(run)?;
    let id = store.add_match_profile(&profile).await?;
    info!(
        run_id = %run.run_id,
        profile_id = id,
        phase = profile.analysis_phase.as_str(),
        "Saved analysis"
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Frame;
    use crate::pipeline::{BranchOutcome, ScoringOutcome};
    use wingman_common::models::{AspectCompatibility, StructuredAnalysis};

    fn finished_run() -> AnalysisRun {
        let mut run = AnalysisRun::new();
        run.frames = vec![Frame::new(0, "image/png", vec![7, 7])];
        run.analysis = Some(StructuredAnalysis {
            name: Some("Noor".to_string()),
            age: Some(27),
            ..Default::default()
        });
        run.scoring = Some(ScoringOutcome {
            virtue: BranchOutcome::Error { message: "HTTP 500".to_string() },
            aspect: BranchOutcome::Success {
                value: AspectCompatibility {
                    scores: Vec::new(),
                    overall_score: 6.5,
                    summary: "Good fit".to_string(),
                    generated_at: None,
                },
            },
        });
        run
    }

    #[test]
    fn test_profile_carries_successful_branches_only() {
        let mut run = finished_run();
        run.transition_to(RunState::QuickAnalyzing);
        run.transition_to(RunState::DeepAnalyzing);
        run.transition_to(RunState::Scoring);
        run.transition_to(RunState::Complete);

        let profile = profile_from_run(&run).unwrap();
        assert_eq!(profile.name, "Noor");
        assert_eq!(profile.analysis_phase, AnalysisPhase::Complete);
        assert_eq!(profile.thumbnail, Some(vec![7, 7]));
        assert!(profile.virtue_scores.is_none());
        assert_eq!(profile.aspect_scores.unwrap().overall_score, 6.5);
    }

    #[test]
    fn test_run_without_analysis_is_rejected() {
        let run = AnalysisRun::new();
        assert!(matches!(profile_from_run(&run), Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancelled_after_deep_saves_at_deep_phase() {
        let store = ArtifactStore::open_in_memory().await.unwrap();
        let mut run = finished_run();
        run.transition_to(RunState::QuickAnalyzing);
        run.transition_to(RunState::DeepAnalyzing);
        run.transition_to(RunState::Scoring);
        run.transition_to(RunState::Cancelled);

        let id = save_analysis(&store, &run).await.unwrap();
        let saved = store.get_match_profile(id).await.unwrap().unwrap();
        assert_eq!(saved.analysis_phase, AnalysisPhase::Deep);
    }
}
