//! Coaching history and inference audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Match,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tactic {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One coaching interaction about a match
///
/// `profile_id` references a [`super::MatchProfile`] without owning it;
/// sessions survive deletion of their profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingSession {
    #[serde(skip)]
    pub id: i64,
    pub profile_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    #[serde(default)]
    pub tactics: Vec<Tactic>,
    #[serde(default)]
    pub suggested_responses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_response: Option<String>,
    /// User rating of how the sent response landed (1-10)
    #[serde(default)]
    pub outcome_score: Option<u8>,
}

impl CoachingSession {
    pub fn new(profile_id: i64, conversation: Vec<ConversationTurn>) -> Self {
        Self {
            id: 0,
            profile_id,
            created_at: Utc::now(),
            conversation,
            tactics: Vec::new(),
            suggested_responses: Vec::new(),
            sent_response: None,
            outcome_score: None,
        }
    }
}

/// Audit entry for one external inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    #[serde(skip)]
    pub id: i64,
    /// Feature tag, e.g. `deep_analysis`
    pub feature: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

fn default_success() -> bool {
    true
}

/// Aggregated inference usage for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceUsage {
    pub feature: String,
    pub calls: u64,
    pub failures: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}
