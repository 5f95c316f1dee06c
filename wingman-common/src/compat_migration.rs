//! Legacy aspect model → 11-virtue model conversion
//!
//! The legacy model scored 23 aspects; the current one scores 11 virtues.
//! Every virtue is fed by a fixed set of aspects and needs a minimum number of
//! them to be present before it can be derived.
//!
//! The `migrate_*` functions assume the matching `can_migrate_*` predicate
//! holds and do not validate; the `try_migrate_*` wrappers check first and
//! return [`Error::MigrationPrecondition`].
//!
//! Output is a pure function of the input except for the timestamp fields
//! (`last_updated`, `generated_at`).

use crate::models::{
    AspectCompatibility, AspectProfile, VirtueAlignment, VirtueCompatibility, VirtueProfile,
    VirtueScore,
};
use crate::{Error, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Contributing aspects for one virtue
#[derive(Debug, Clone, Copy)]
pub struct VirtueMapping {
    pub virtue_id: &'static str,
    pub aspects: &'static [&'static str],
    /// Contributing aspects that must be scored to derive this virtue
    pub min_coverage: usize,
}

/// The 11 current virtues, in display order
pub const VIRTUE_IDS: [&str; 11] = [
    "honesty",
    "compassion",
    "courage",
    "curiosity",
    "humor",
    "ambition",
    "loyalty",
    "emotional_depth",
    "independence",
    "adventurousness",
    "stability",
];

/// The 23 legacy aspects
pub const ASPECT_IDS: [&str; 23] = [
    "authenticity",
    "transparency",
    "empathy",
    "warmth",
    "generosity",
    "confidence",
    "assertiveness",
    "resilience",
    "openness",
    "intellectualism",
    "creativity",
    "wit",
    "playfulness",
    "drive",
    "discipline",
    "commitment",
    "reliability",
    "self_awareness",
    "vulnerability",
    "self_sufficiency",
    "spontaneity",
    "thrill_seeking",
    "calmness",
];

pub const VIRTUE_MAPPINGS: [VirtueMapping; 11] = [
    VirtueMapping { virtue_id: "honesty", aspects: &["authenticity", "transparency"], min_coverage: 1 },
    VirtueMapping { virtue_id: "compassion", aspects: &["empathy", "warmth", "generosity"], min_coverage: 2 },
    VirtueMapping { virtue_id: "courage", aspects: &["confidence", "assertiveness", "resilience"], min_coverage: 2 },
    VirtueMapping { virtue_id: "curiosity", aspects: &["openness", "intellectualism", "creativity"], min_coverage: 2 },
    VirtueMapping { virtue_id: "humor", aspects: &["wit", "playfulness"], min_coverage: 1 },
    VirtueMapping { virtue_id: "ambition", aspects: &["drive", "discipline"], min_coverage: 1 },
    VirtueMapping { virtue_id: "loyalty", aspects: &["commitment", "reliability"], min_coverage: 1 },
    VirtueMapping { virtue_id: "emotional_depth", aspects: &["self_awareness", "vulnerability"], min_coverage: 1 },
    VirtueMapping { virtue_id: "independence", aspects: &["self_sufficiency"], min_coverage: 1 },
    VirtueMapping { virtue_id: "adventurousness", aspects: &["spontaneity", "thrill_seeking"], min_coverage: 1 },
    VirtueMapping { virtue_id: "stability", aspects: &["calmness", "reliability"], min_coverage: 1 },
];

/// Reverse index: legacy aspect → virtues it feeds
static VIRTUES_BY_ASPECT: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut index: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
    for mapping in VIRTUE_MAPPINGS.iter() {
        for aspect in mapping.aspects {
            index.entry(*aspect).or_default().push(mapping.virtue_id);
        }
    }
    index
});

/// Virtues a legacy aspect contributes to (empty for unknown aspects)
pub fn virtues_for_aspect(aspect_id: &str) -> &'static [&'static str] {
    VIRTUES_BY_ASPECT
        .get(aspect_id)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

/// A contributing aspect value found on the source record
struct Contribution<'a> {
    aspect_id: &'a str,
    score: f64,
    evidence: &'a str,
}

fn contributions<'a, F>(mapping: &VirtueMapping, lookup: F) -> Vec<Contribution<'a>>
where
    F: Fn(&str) -> Option<(f64, &'a str)>,
{
    mapping
        .aspects
        .iter()
        .copied()
        .filter_map(|aspect_id| {
            lookup(aspect_id)
                .filter(|(score, _)| score.is_finite())
                .map(|(score, evidence)| Contribution { aspect_id, score, evidence })
        })
        .collect()
}

fn covered<'a, F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<(f64, &'a str)> + Copy,
{
    VIRTUE_MAPPINGS
        .iter()
        .all(|mapping| contributions(mapping, lookup).len() >= mapping.min_coverage.max(1))
}

/// Mean of the contributions (or the single value), clamped to 0-10, one decimal
fn aggregate_score(parts: &[Contribution<'_>]) -> f64 {
    let mean = if parts.len() == 1 {
        parts[0].score
    } else {
        parts.iter().map(|p| p.score).sum::<f64>() / parts.len() as f64
    };
    (mean.clamp(0.0, 10.0) * 10.0).round() / 10.0
}

/// Evidence of the highest-scoring contributor, earliest on ties
fn carry_evidence(virtue_id: &str, parts: &[Contribution<'_>]) -> String {
    let best = parts.iter().fold(None::<&Contribution<'_>>, |best, part| match best {
        Some(b) if b.score >= part.score => Some(b),
        _ => Some(part),
    });

    if let Some(best) = best {
        if !best.evidence.trim().is_empty() {
            return best.evidence.to_string();
        }
    }

    let mut by_score: Vec<&Contribution<'_>> = parts.iter().collect();
    by_score.sort_by(|a, b| b.score.total_cmp(&a.score));
    if let Some(found) = by_score.iter().find(|p| !p.evidence.trim().is_empty()) {
        return found.evidence.to_string();
    }

    let names: Vec<&str> = parts.iter().map(|p| p.aspect_id).collect();
    format!("Derived {} from {}", virtue_id, names.join(", "))
}

fn derive_virtue_scores<'a, F>(lookup: F) -> Vec<VirtueScore>
where
    F: Fn(&str) -> Option<(f64, &'a str)> + Copy,
{
    VIRTUE_MAPPINGS
        .iter()
        .map(|mapping| {
            let parts = contributions(mapping, lookup);
            VirtueScore {
                virtue_id: mapping.virtue_id.to_string(),
                score: aggregate_score(&parts),
                evidence: carry_evidence(mapping.virtue_id, &parts),
            }
        })
        .collect()
}

// ============================================================================
// User side: aspect_profile → virtue_profile
// ============================================================================

/// True iff `profile` covers enough of the aspect taxonomy to derive all 11 virtues
pub fn can_migrate_aspect_profile(profile: &AspectProfile) -> bool {
    if profile.scores.is_empty() {
        return false;
    }
    covered(|aspect_id| {
        profile
            .score_for(aspect_id)
            .map(|s| (s.score, s.evidence.as_str()))
    })
}

/// Convert a legacy aspect profile into the virtue model
///
/// Caller must have checked [`can_migrate_aspect_profile`].
pub fn migrate_aspect_profile_to_virtues(profile: &AspectProfile) -> VirtueProfile {
    let scores = derive_virtue_scores(|aspect_id| {
        profile
            .score_for(aspect_id)
            .map(|s| (s.score, s.evidence.as_str()))
    });

    VirtueProfile {
        scores,
        last_updated: Utc::now(),
    }
}

/// Checked variant of [`migrate_aspect_profile_to_virtues`]
pub fn try_migrate_aspect_profile(profile: &AspectProfile) -> Result<VirtueProfile> {
    if !can_migrate_aspect_profile(profile) {
        return Err(Error::MigrationPrecondition(
            "aspect profile does not cover every virtue".to_string(),
        ));
    }
    Ok(migrate_aspect_profile_to_virtues(profile))
}

// ============================================================================
// Match side: aspect_scores → virtues11
// ============================================================================

/// True iff the match's aspect scores cover every virtue and the user has a full virtue profile
pub fn can_migrate_aspect_scores(
    scores: &AspectCompatibility,
    user_profile: Option<&VirtueProfile>,
) -> bool {
    let Some(user_profile) = user_profile else {
        return false;
    };
    if scores.scores.is_empty() {
        return false;
    }
    let user_complete = VIRTUE_IDS
        .iter()
        .all(|virtue_id| user_profile.score_for(virtue_id).is_some());

    user_complete && covered(|aspect_id| partner_lookup(scores, aspect_id))
}

fn partner_lookup<'a>(scores: &'a AspectCompatibility, aspect_id: &str) -> Option<(f64, &'a str)> {
    scores
        .scores
        .iter()
        .find(|s| s.aspect_id == aspect_id)
        .map(|s| (s.partner_score, s.rationale.as_str()))
}

/// Convert legacy match aspect scores into 11-virtue compatibility
///
/// Compatibility depends on both sides: the partner's side comes from the
/// legacy scores, the user's side from `user_profile`. Caller must have
/// checked [`can_migrate_aspect_scores`].
pub fn migrate_aspect_scores_to_virtues11(
    scores: &AspectCompatibility,
    user_profile: &VirtueProfile,
) -> VirtueCompatibility {
    let partner = derive_virtue_scores(|aspect_id| partner_lookup(scores, aspect_id));

    let alignments: Vec<VirtueAlignment> = partner
        .into_iter()
        .map(|virtue| {
            let user_score = user_profile
                .score_for(&virtue.virtue_id)
                .map(|s| s.score)
                .unwrap_or(0.0);
            let alignment =
                ((10.0 - (virtue.score - user_score).abs()).clamp(0.0, 10.0) * 10.0).round() / 10.0;
            VirtueAlignment {
                virtue_id: virtue.virtue_id,
                partner_score: virtue.score,
                user_score,
                alignment,
                evidence: virtue.evidence,
            }
        })
        .collect();

    let overall = alignments.iter().map(|a| a.alignment).sum::<f64>() / alignments.len() as f64;

    let summary = if scores.summary.trim().is_empty() {
        "Derived from legacy aspect scores".to_string()
    } else {
        scores.summary.clone()
    };

    VirtueCompatibility {
        scores: alignments,
        overall_alignment: (overall * 10.0).round() / 10.0,
        summary,
        generated_at: Utc::now(),
    }
}

/// Checked variant of [`migrate_aspect_scores_to_virtues11`]
pub fn try_migrate_aspect_scores(
    scores: &AspectCompatibility,
    user_profile: Option<&VirtueProfile>,
) -> Result<VirtueCompatibility> {
    match user_profile {
        Some(user) if can_migrate_aspect_scores(scores, Some(user)) => {
            Ok(migrate_aspect_scores_to_virtues11(scores, user))
        }
        _ => Err(Error::MigrationPrecondition(
            "aspect scores or user virtue profile incomplete".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectMatchScore, AspectScore};

    fn full_profile() -> AspectProfile {
        AspectProfile {
            scores: ASPECT_IDS
                .iter()
                .enumerate()
                .map(|(i, id)| AspectScore {
                    aspect_id: id.to_string(),
                    score: (i % 10) as f64 + 0.5,
                    evidence: format!("evidence for {}", id),
                    confidence: None,
                })
                .collect(),
            summary: None,
            last_updated: None,
        }
    }

    #[test]
    fn test_taxonomy_tables_consistent() {
        let mut mapped: Vec<&str> = VIRTUE_MAPPINGS
            .iter()
            .flat_map(|m| m.aspects.iter().copied())
            .collect();
        mapped.sort_unstable();
        mapped.dedup();
        assert_eq!(mapped.len(), ASPECT_IDS.len());
        for aspect in ASPECT_IDS {
            assert!(!virtues_for_aspect(aspect).is_empty(), "{} unmapped", aspect);
        }
        assert_eq!(virtues_for_aspect("reliability"), &["loyalty", "stability"]);
        for (mapping, id) in VIRTUE_MAPPINGS.iter().zip(VIRTUE_IDS) {
            assert_eq!(mapping.virtue_id, id);
            assert!(mapping.min_coverage <= mapping.aspects.len());
        }
    }

    #[test]
    fn test_empty_profile_cannot_migrate() {
        assert!(!can_migrate_aspect_profile(&AspectProfile::default()));
    }

    #[test]
    fn test_insufficient_coverage_cannot_migrate() {
        let mut profile = full_profile();
        // compassion needs two of empathy/warmth/generosity
        profile
            .scores
            .retain(|s| s.aspect_id != "empathy" && s.aspect_id != "warmth");
        assert!(!can_migrate_aspect_profile(&profile));
        assert!(matches!(
            try_migrate_aspect_profile(&profile),
            Err(Error::MigrationPrecondition(_))
        ));
    }

    #[test]
    fn test_every_virtue_scored_with_evidence() {
        let profile = full_profile();
        assert!(can_migrate_aspect_profile(&profile));

        let virtues = migrate_aspect_profile_to_virtues(&profile);
        assert_eq!(virtues.scores.len(), 11);
        for score in &virtues.scores {
            assert!((0.0..=10.0).contains(&score.score));
            assert!(!score.evidence.is_empty());
        }
    }

    #[test]
    fn test_single_contributor_keeps_value() {
        let profile = full_profile();
        let virtues = migrate_aspect_profile_to_virtues(&profile);
        let expected = profile.score_for("self_sufficiency").unwrap().score;
        assert_eq!(virtues.score_for("independence").unwrap().score, expected);
    }

    #[test]
    fn test_evidence_from_highest_contributor() {
        let mut profile = full_profile();
        for s in profile.scores.iter_mut() {
            match s.aspect_id.as_str() {
                "wit" => s.score = 3.0,
                "playfulness" => s.score = 9.0,
                _ => {}
            }
        }
        let virtues = migrate_aspect_profile_to_virtues(&profile);
        let humor = virtues.score_for("humor").unwrap();
        assert_eq!(humor.score, 6.0);
        assert_eq!(humor.evidence, "evidence for playfulness");
    }

    #[test]
    fn test_blank_evidence_falls_back() {
        let mut profile = full_profile();
        for s in profile.scores.iter_mut() {
            s.evidence.clear();
        }
        let virtues = migrate_aspect_profile_to_virtues(&profile);
        let honesty = virtues.score_for("honesty").unwrap();
        assert_eq!(honesty.evidence, "Derived honesty from authenticity, transparency");
    }

    #[test]
    fn test_out_of_range_scores_clamped() {
        let mut profile = full_profile();
        for s in profile.scores.iter_mut() {
            if s.aspect_id == "self_sufficiency" {
                s.score = 42.0;
            }
        }
        let virtues = migrate_aspect_profile_to_virtues(&profile);
        assert_eq!(virtues.score_for("independence").unwrap().score, 10.0);
    }

    #[test]
    fn test_migration_idempotent() {
        let profile = full_profile();
        let first = migrate_aspect_profile_to_virtues(&profile);
        let second = migrate_aspect_profile_to_virtues(&profile);
        assert_eq!(first.scores, second.scores);
    }

    #[test]
    fn test_match_side_requires_user_profile() {
        let scores = AspectCompatibility {
            scores: ASPECT_IDS
                .iter()
                .map(|id| AspectMatchScore {
                    aspect_id: id.to_string(),
                    partner_score: 7.0,
                    rationale: format!("{} shows", id),
                })
                .collect(),
            overall_score: 7.0,
            summary: String::new(),
            generated_at: None,
        };
        assert!(!can_migrate_aspect_scores(&scores, None));

        let user = migrate_aspect_profile_to_virtues(&full_profile());
        assert!(can_migrate_aspect_scores(&scores, Some(&user)));

        let virtues11 = migrate_aspect_scores_to_virtues11(&scores, &user);
        assert_eq!(virtues11.scores.len(), 11);
        for alignment in &virtues11.scores {
            assert_eq!(alignment.partner_score, 7.0);
            let expected = 10.0 - (7.0 - alignment.user_score).abs();
            assert!((alignment.alignment - expected).abs() < 0.051);
        }
        assert_eq!(virtues11.summary, "Derived from legacy aspect scores");

        let again = migrate_aspect_scores_to_virtues11(&scores, &user);
        assert_eq!(virtues11.scores, again.scores);
        assert_eq!(virtues11.overall_alignment, again.overall_alignment);
    }
}
