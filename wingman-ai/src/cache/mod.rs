//! Generated compatibility artifacts
//!
//! Each artifact kind is derived from a saved match profile plus the user's
//! synthesis by one inference call, then cached on the profile record.
//! [`GeneratedArtifactCache`] drives generation for one profile and one kind;
//! [`AutoGenerator`] triggers it once per session when prerequisites appear.

mod auto;
mod generated;

pub use auto::{should_trigger, AutoGenerator, Snapshot};
pub use generated::GeneratedArtifactCache;

use crate::error::CacheError;
use crate::inference::InferenceTask;
use crate::prompts;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use wingman_common::models::{
    AspectCompatibility, DateSuggestions, MatchProfile, MatchProfilePatch, PartnerVirtueScore,
    UserIdentity, VirtueCompatibility, ZodiacCompatibility,
};

/// One kind of generated artifact
pub trait ArtifactKind: Send + Sync + 'static {
    type Artifact: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Short name used in logs and session guard keys
    const NAME: &'static str;
    const TASK: InferenceTask;

    /// The artifact already stored on the profile
    fn cached(profile: &MatchProfile) -> Option<&Self::Artifact>;

    /// Prompt for generating the artifact, or `None` when the source data is missing
    fn prompt(profile: &MatchProfile, identity: &UserIdentity) -> Option<String>;

    /// Write-back patch
    fn patch(artifact: Self::Artifact) -> MatchProfilePatch;

    fn prerequisites_met(profile: &MatchProfile, identity: &UserIdentity) -> bool {
        Self::prompt(profile, identity).is_some()
    }

    /// Prerequisites exist and nothing is cached yet
    fn can_generate(profile: &MatchProfile, identity: &UserIdentity) -> bool {
        Self::cached(profile).is_none() && Self::prerequisites_met(profile, identity)
    }
}

/// Match scored against the user's partner virtues
pub struct VirtueScores;

impl ArtifactKind for VirtueScores {
    type Artifact = Vec<PartnerVirtueScore>;
    const NAME: &'static str = "virtue_scores";
    const TASK: InferenceTask = InferenceTask::VirtueScoring;

    fn cached(profile: &MatchProfile) -> Option<&Self::Artifact> {
        profile.virtue_scores.as_ref()
    }

    fn prompt(profile: &MatchProfile, identity: &UserIdentity) -> Option<String> {
        let synthesis = identity.synthesis.as_ref().filter(|s| s.has_partner_virtues())?;
        Some(prompts::virtue_scoring(&profile.analysis, &synthesis.partner_virtues))
    }

    fn patch(artifact: Self::Artifact) -> MatchProfilePatch {
        MatchProfilePatch {
            virtue_scores: Some(artifact),
            ..Default::default()
        }
    }
}

/// Legacy 23-aspect compatibility
pub struct AspectScores;

impl ArtifactKind for AspectScores {
    type Artifact = AspectCompatibility;
    const NAME: &'static str = "aspect_scores";
    const TASK: InferenceTask = InferenceTask::AspectScoring;

    fn cached(profile: &MatchProfile) -> Option<&Self::Artifact> {
        profile.aspect_scores.as_ref()
    }

    fn prompt(profile: &MatchProfile, identity: &UserIdentity) -> Option<String> {
        let aspects = identity.aspect_profile().filter(|a| !a.scores.is_empty())?;
        Some(prompts::aspect_scoring(&profile.analysis, aspects))
    }

    fn patch(artifact: Self::Artifact) -> MatchProfilePatch {
        MatchProfilePatch {
            aspect_scores: Some(artifact),
            ..Default::default()
        }
    }
}

/// 11-virtue compatibility
pub struct Virtues11;

impl ArtifactKind for Virtues11 {
    type Artifact = VirtueCompatibility;
    const NAME: &'static str = "virtues11";
    const TASK: InferenceTask = InferenceTask::Virtues11;

    fn cached(profile: &MatchProfile) -> Option<&Self::Artifact> {
        profile.virtues11.as_ref()
    }

    fn prompt(profile: &MatchProfile, identity: &UserIdentity) -> Option<String> {
        let virtues = identity.virtue_profile().filter(|v| !v.scores.is_empty())?;
        Some(prompts::virtues11(profile, virtues))
    }

    fn patch(artifact: Self::Artifact) -> MatchProfilePatch {
        MatchProfilePatch {
            virtues11: Some(artifact),
            ..Default::default()
        }
    }
}

pub struct Zodiac;

impl ArtifactKind for Zodiac {
    type Artifact = ZodiacCompatibility;
    const NAME: &'static str = "zodiac";
    const TASK: InferenceTask = InferenceTask::Zodiac;

    fn cached(profile: &MatchProfile) -> Option<&Self::Artifact> {
        profile.zodiac_compatibility.as_ref()
    }

    fn prompt(profile: &MatchProfile, identity: &UserIdentity) -> Option<String> {
        let user_sign = identity.manual_fields.zodiac_sign.as_deref()?;
        let partner_sign = profile.zodiac_sign.as_deref()?;
        Some(prompts::zodiac(user_sign, partner_sign))
    }

    fn patch(artifact: Self::Artifact) -> MatchProfilePatch {
        MatchProfilePatch {
            zodiac_compatibility: Some(artifact),
            ..Default::default()
        }
    }
}

pub struct DateIdeas;

impl ArtifactKind for DateIdeas {
    type Artifact = DateSuggestions;
    const NAME: &'static str = "date_ideas";
    const TASK: InferenceTask = InferenceTask::DateIdeas;

    fn cached(profile: &MatchProfile) -> Option<&Self::Artifact> {
        profile.date_suggestions.as_ref()
    }

    fn prompt(profile: &MatchProfile, identity: &UserIdentity) -> Option<String> {
        identity.synthesis.as_ref()?;
        Some(prompts::date_ideas(profile, identity))
    }

    fn patch(artifact: Self::Artifact) -> MatchProfilePatch {
        MatchProfilePatch {
            date_suggestions: Some(artifact),
            ..Default::default()
        }
    }
}

/// Observable state of one cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<CacheError>,
    pub can_generate: bool,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            can_generate: false,
        }
    }
}
