//! Compatibility scoring records
//!
//! Two generations coexist in stored data:
//! - the legacy 23-aspect model (`AspectProfile`, `AspectCompatibility`)
//! - the current 11-virtue model (`VirtueProfile`, `VirtueCompatibility`)
//!
//! See [`crate::compat_migration`] for the conversion between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scored dimension of the legacy aspect model (0-10)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectScore {
    pub aspect_id: String,
    pub score: f64,
    #[serde(default)]
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Legacy 23-dimension personality profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AspectProfile {
    #[serde(default)]
    pub scores: Vec<AspectScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl AspectProfile {
    /// Score recorded for `aspect_id`, if any
    pub fn score_for(&self, aspect_id: &str) -> Option<&AspectScore> {
        self.scores.iter().find(|s| s.aspect_id == aspect_id)
    }
}

/// One scored dimension of the current virtue model (0-10)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtueScore {
    pub virtue_id: String,
    pub score: f64,
    #[serde(default)]
    pub evidence: String,
}

/// Current 11-virtue personality profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtueProfile {
    #[serde(default)]
    pub scores: Vec<VirtueScore>,
    pub last_updated: DateTime<Utc>,
}

impl VirtueProfile {
    pub fn score_for(&self, virtue_id: &str) -> Option<&VirtueScore> {
        self.scores.iter().find(|s| s.virtue_id == virtue_id)
    }
}

/// A quality the user is looking for in a partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerVirtue {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
}

/// How strongly a match shows one of the user's partner virtues
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerVirtueScore {
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub evidence: String,
}

/// Per-aspect score of a match under the legacy model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectMatchScore {
    pub aspect_id: String,
    pub partner_score: f64,
    #[serde(default)]
    pub rationale: String,
}

/// Legacy aspect-based compatibility artifact stored on a match profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectCompatibility {
    #[serde(default)]
    pub scores: Vec<AspectMatchScore>,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Per-virtue alignment between the user and a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtueAlignment {
    pub virtue_id: String,
    pub partner_score: f64,
    pub user_score: f64,
    /// `10 - |partner_score - user_score|`
    pub alignment: f64,
    #[serde(default)]
    pub evidence: String,
}

/// Current 11-virtue compatibility artifact (`virtues11`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtueCompatibility {
    pub scores: Vec<VirtueAlignment>,
    pub overall_alignment: f64,
    #[serde(default)]
    pub summary: String,
    pub generated_at: DateTime<Utc>,
}

/// Astrological compatibility artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZodiacCompatibility {
    pub user_sign: String,
    pub partner_sign: String,
    pub score: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateIdea {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Date-ideas artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateSuggestions {
    pub ideas: Vec<DateIdea>,
}

/// Compatibility block produced inline by deep analysis when user context exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityBlock {
    pub score: f64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub green_flags: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}
