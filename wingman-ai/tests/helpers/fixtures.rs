//! Payload and record fixtures

use serde_json::{json, Value};
use wingman_ai::media::Frame;
use wingman_common::compat_migration::ASPECT_IDS;
use wingman_common::models::{
    AspectProfile, AspectScore, PartnerVirtue, Synthesis, UserIdentity,
};

pub fn frames(count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| Frame::new(i, "image/png", vec![0x89, b'P', b'N', b'G', i as u8]))
        .collect()
}

pub fn quick_payload() -> Value {
    json!({"name": "Maya", "age": 29, "app_source": "hinge", "zodiac_sign": "Sagittarius"})
}

pub fn deep_payload() -> Value {
    json!({
        "name": "Maya",
        "photos": [{"index": 0, "observations": "Hiking at sunrise", "vibe": "outdoorsy"}],
        "psychological_profile": {"summary": "Adventurous and warm", "traits": ["curious", "kind"]},
        "prompts": [{"prompt": "Typical Sunday", "answer": "Trail run then brunch", "insight": "Active"}],
        "openers": [{"text": "Which trail was that?", "rationale": "She loves hiking"}]
    })
}

pub fn virtue_scores_payload() -> Value {
    json!([{"name": "kindness", "score": 8.0, "evidence": "Volunteers on weekends"}])
}

pub fn aspect_scores_payload() -> Value {
    json!({
        "scores": [{"aspect_id": "empathy", "partner_score": 7.5, "rationale": "Warm prompts"}],
        "overall_score": 7.2,
        "summary": "Strong overlap"
    })
}

pub fn virtues11_payload() -> Value {
    json!({
        "scores": [{
            "virtue_id": "honesty", "partner_score": 8.0, "user_score": 7.0,
            "alignment": 9.0, "evidence": "Direct prompts"
        }],
        "overall_alignment": 9.0,
        "summary": "Well aligned",
        "generated_at": "2026-01-01T00:00:00Z"
    })
}

pub fn zodiac_payload() -> Value {
    json!({"user_sign": "Leo", "partner_sign": "Sagittarius", "score": 8.0, "summary": "Fire signs"})
}

/// Aspect profile covering every legacy aspect
pub fn full_aspect_profile() -> AspectProfile {
    AspectProfile {
        scores: ASPECT_IDS
            .iter()
            .enumerate()
            .map(|(i, id)| AspectScore {
                aspect_id: id.to_string(),
                score: 4.0 + (i % 5) as f64,
                evidence: format!("{} shows in daily life", id),
                confidence: None,
            })
            .collect(),
        summary: None,
        last_updated: None,
    }
}

pub fn partner_virtues() -> Vec<PartnerVirtue> {
    vec![PartnerVirtue {
        name: "kindness".to_string(),
        description: "Treats strangers well".to_string(),
        importance: Some(0.9),
    }]
}

/// Identity with both scoring prerequisites
pub fn identity_with_both_profiles() -> UserIdentity {
    UserIdentity {
        synthesis: Some(Synthesis {
            partner_virtues: partner_virtues(),
            aspect_profile: Some(full_aspect_profile()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Identity with an aspect profile and no partner virtues
pub fn identity_with_aspects_only() -> UserIdentity {
    UserIdentity {
        synthesis: Some(Synthesis {
            aspect_profile: Some(full_aspect_profile()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
