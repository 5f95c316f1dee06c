//! The user's own identity record (singleton, key 1)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::compatibility::{AspectProfile, PartnerVirtue, VirtueProfile};

/// Well-known key of the single identity row
pub const IDENTITY_ID: i64 = 1;

/// Exported chat/app history the user imported about themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataExport {
    pub source: String,
    pub content: String,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextInput {
    #[serde(default)]
    pub label: String,
    pub text: String,
    pub added_at: DateTime<Utc>,
}

/// Fields the user typed in directly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zodiac_sign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub looking_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Derived psychological profile of the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub core_traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_style: Option<String>,
    #[serde(default)]
    pub partner_virtues: Vec<PartnerVirtue>,
    /// Legacy 23-aspect profile, kept after migration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_profile: Option<AspectProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtue_profile: Option<VirtueProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Synthesis {
    pub fn has_partner_virtues(&self) -> bool {
        !self.partner_virtues.is_empty()
    }

    pub fn has_aspect_scores(&self) -> bool {
        self.aspect_profile
            .as_ref()
            .is_some_and(|profile| !profile.scores.is_empty())
    }

    pub fn has_virtue_scores(&self) -> bool {
        self.virtue_profile
            .as_ref()
            .is_some_and(|profile| !profile.scores.is_empty())
    }
}

/// User reaction to one generated insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightFeedback {
    pub insight: String,
    pub helpful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySettings {
    #[serde(default = "default_coaching_tone")]
    pub coaching_tone: String,
    #[serde(default = "default_true")]
    pub auto_generate_compatibility: bool,
}

fn default_coaching_tone() -> String {
    "balanced".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            coaching_tone: default_coaching_tone(),
            auto_generate_compatibility: true,
        }
    }
}

/// The user's self-description inputs and derived synthesis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(skip)]
    pub id: i64,
    #[serde(default)]
    pub data_exports: Vec<DataExport>,
    #[serde(default)]
    pub text_inputs: Vec<TextInput>,
    /// Encoded still frames from self-intro videos
    #[serde(default)]
    pub video_frames: Vec<String>,
    /// Encoded photos of the user
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub manual_fields: ManualFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<Synthesis>,
    #[serde(default)]
    pub insight_feedback: Vec<InsightFeedback>,
    #[serde(default)]
    pub settings: IdentitySettings,
}

impl UserIdentity {
    pub fn partner_virtues(&self) -> &[PartnerVirtue] {
        self.synthesis
            .as_ref()
            .map(|s| s.partner_virtues.as_slice())
            .unwrap_or(&[])
    }

    pub fn aspect_profile(&self) -> Option<&AspectProfile> {
        self.synthesis.as_ref().and_then(|s| s.aspect_profile.as_ref())
    }

    pub fn virtue_profile(&self) -> Option<&VirtueProfile> {
        self.synthesis.as_ref().and_then(|s| s.virtue_profile.as_ref())
    }
}

/// Partial update for the identity row
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_exports: Option<Vec<DataExport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_inputs: Option<Vec<TextInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_frames: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_fields: Option<ManualFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<Synthesis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insight_feedback: Option<Vec<InsightFeedback>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<IdentitySettings>,
}
