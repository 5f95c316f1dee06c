//! Match profile record and its analysis variants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::compatibility::{
    AspectCompatibility, CompatibilityBlock, DateSuggestions, PartnerVirtueScore,
    VirtueCompatibility, ZodiacCompatibility,
};

/// Progress marker of a profile through the analysis pipeline
///
/// Ordered: `Quick < Deep < Complete`. Stored phases never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    /// Only the quick basics (name/age/app) are known
    Quick,
    /// Structured deep analysis exists, scoring not finished
    Deep,
    /// Scoring branches have settled
    Complete,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPhase::Quick => "quick",
            AnalysisPhase::Deep => "deep",
            AnalysisPhase::Complete => "complete",
        }
    }

    /// Position in the quick -> deep -> complete progression
    pub fn rank(&self) -> i64 {
        match self {
            AnalysisPhase::Quick => 0,
            AnalysisPhase::Deep => 1,
            AnalysisPhase::Complete => 2,
        }
    }
}

/// Read of a single profile photo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoRead {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub observations: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibe: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsychologicalProfile {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_style: Option<String>,
}

/// One written prompt on the dating profile and what it reveals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRead {
    pub prompt: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub insight: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Opener {
    pub text: String,
    #[serde(default)]
    pub rationale: String,
}

/// Fully parsed deep analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_source: Option<String>,
    #[serde(default)]
    pub photos: Vec<PhotoRead>,
    #[serde(default)]
    pub psychological_profile: PsychologicalProfile,
    #[serde(default)]
    pub prompts: Vec<PromptRead>,
    #[serde(default)]
    pub openers: Vec<Opener>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityBlock>,
}

/// Analysis shape written by older releases
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyAnalysis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub green_flags: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub openers: Vec<String>,
}

/// Analysis stored on a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileAnalysis {
    Structured(StructuredAnalysis),
    Legacy(LegacyAnalysis),
    /// Unparsed model output kept verbatim
    RawFallback { text: String },
}

impl ProfileAnalysis {
    pub fn structured(&self) -> Option<&StructuredAnalysis> {
        match self {
            ProfileAnalysis::Structured(analysis) => Some(analysis),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, ProfileAnalysis::Structured(_))
    }

    /// Best available one-paragraph summary
    pub fn summary(&self) -> &str {
        match self {
            ProfileAnalysis::Structured(analysis) => &analysis.psychological_profile.summary,
            ProfileAnalysis::Legacy(analysis) => &analysis.summary,
            ProfileAnalysis::RawFallback { text } => text,
        }
    }

    /// Suggested opening lines, whatever the analysis generation
    pub fn opener_lines(&self) -> Vec<String> {
        match self {
            ProfileAnalysis::Structured(analysis) => {
                analysis.openers.iter().map(|o| o.text.clone()).collect()
            }
            ProfileAnalysis::Legacy(analysis) => analysis.openers.clone(),
            ProfileAnalysis::RawFallback { .. } => Vec::new(),
        }
    }
}

/// A saved dating-app match
///
/// `id` and `thumbnail` live in their own columns, everything else in the
/// JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProfile {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub analysis: ProfileAnalysis,
    pub analysis_phase: AnalysisPhase,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zodiac_compatibility: Option<ZodiacCompatibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_suggestions: Option<DateSuggestions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtue_scores: Option<Vec<PartnerVirtueScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_scores: Option<AspectCompatibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtues11: Option<VirtueCompatibility>,
    /// Sign read from the profile, used for zodiac compatibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zodiac_sign: Option<String>,
}

impl MatchProfile {
    /// New, unsaved profile (id 0)
    pub fn new(name: impl Into<String>, analysis: ProfileAnalysis, phase: AnalysisPhase) -> Self {
        Self {
            id: 0,
            name: name.into(),
            age: None,
            app_source: None,
            created_at: Utc::now(),
            analysis,
            analysis_phase: phase,
            thumbnail: None,
            compatibility: None,
            zodiac_compatibility: None,
            date_suggestions: None,
            virtue_scores: None,
            aspect_scores: None,
            virtues11: None,
            zodiac_sign: None,
        }
    }
}

/// Partial update for a match profile
///
/// Only `Some` fields are written; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ProfileAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_phase: Option<AnalysisPhase>,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zodiac_compatibility: Option<ZodiacCompatibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_suggestions: Option<DateSuggestions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtue_scores: Option<Vec<PartnerVirtueScore>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_scores: Option<AspectCompatibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtues11: Option<VirtueCompatibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zodiac_sign: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering() {
        assert!(AnalysisPhase::Quick < AnalysisPhase::Deep);
        assert!(AnalysisPhase::Deep < AnalysisPhase::Complete);
    }

    #[test]
    fn test_analysis_tagging() {
        let raw = ProfileAnalysis::RawFallback { text: "hello".to_string() };
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["kind"], "raw_fallback");
        assert_eq!(json["text"], "hello");

        let legacy: ProfileAnalysis = serde_json::from_value(serde_json::json!({
            "kind": "legacy",
            "summary": "Outdoorsy",
            "openers": ["Best trail nearby?"]
        }))
        .unwrap();
        assert_eq!(legacy.summary(), "Outdoorsy");
        assert_eq!(legacy.opener_lines(), vec!["Best trail nearby?".to_string()]);
        assert!(legacy.structured().is_none());
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let patch = MatchProfilePatch {
            age: Some(29),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["age"], 29);
    }
}
