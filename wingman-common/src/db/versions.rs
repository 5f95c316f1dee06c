//! Built-in schema version history
//!
//! | v  | change |
//! |----|--------|
//! | 1  | `match_profiles`, `user_identity` |
//! | 2  | `coaching_sessions` |
//! | 3  | default `analysis_phase` on pre-progressive profiles |
//! | 4  | `inference_records` |
//! | 5  | identity input arrays defaulted |
//! | 6  | `analysis` converted to the tagged form |
//! | 7  | `app_source` index |
//! | 8  | identity settings defaulted |
//! | 9  | `thumbnail` blob column, coaching session defaults |
//! | 10 | `success` index, legacy audit rows marked successful |
//! | 11 | identity aspect profile → virtue profile |
//! | 12 | match aspect scores → virtues11, `analysis_phase` index |

use crate::compat_migration::{
    can_migrate_aspect_profile, can_migrate_aspect_scores, migrate_aspect_profile_to_virtues,
    migrate_aspect_scores_to_virtues11,
};
use crate::db::migrations::{SchemaVersion, UpgradeContext};
use crate::db::schema_sync::{ColumnDefinition, IndexDefinition, TableShape};
use crate::models::{AspectCompatibility, AspectProfile, VirtueProfile, IDENTITY_ID};
use crate::Result;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub const MATCH_PROFILES: &str = "match_profiles";
pub const USER_IDENTITY: &str = "user_identity";
pub const COACHING_SESSIONS: &str = "coaching_sessions";
pub const INFERENCE_RECORDS: &str = "inference_records";

/// Highest built-in schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 12;

/// The full version chain `v1..v12`
pub fn schema_versions() -> Vec<SchemaVersion> {
    vec![
        SchemaVersion::new(1)
            .table(
                TableShape::documents(MATCH_PROFILES)
                    .index(IndexDefinition::on_field("name"))
                    .index(IndexDefinition::on_field("created_at")),
            )
            .table(TableShape::documents(USER_IDENTITY)),
        SchemaVersion::new(2).table(
            TableShape::documents(COACHING_SESSIONS)
                .index(IndexDefinition::on_field("profile_id"))
                .index(IndexDefinition::on_field("created_at")),
        ),
        SchemaVersion::new(3).upgrade(
            "default analysis_phase to complete",
            &[MATCH_PROFILES],
            default_analysis_phase,
        ),
        SchemaVersion::new(4).table(
            TableShape::documents(INFERENCE_RECORDS)
                .index(IndexDefinition::on_field("feature"))
                .index(IndexDefinition::on_field("created_at")),
        ),
        SchemaVersion::new(5).upgrade(
            "default identity input arrays",
            &[USER_IDENTITY],
            default_identity_arrays,
        ),
        SchemaVersion::new(6).upgrade(
            "convert analysis to tagged form",
            &[MATCH_PROFILES],
            tag_analysis,
        ),
        SchemaVersion::new(7)
            .table(TableShape::documents(MATCH_PROFILES).index(IndexDefinition::on_field("app_source"))),
        SchemaVersion::new(8).upgrade(
            "default identity settings",
            &[USER_IDENTITY],
            default_identity_settings,
        ),
        SchemaVersion::new(9)
            .table(
                TableShape::documents(MATCH_PROFILES)
                    .column(ColumnDefinition::new("thumbnail", "BLOB")),
            )
            .upgrade(
                "default coaching tactics and outcome",
                &[COACHING_SESSIONS],
                default_coaching_fields,
            ),
        SchemaVersion::new(10)
            .table(TableShape::documents(INFERENCE_RECORDS).index(IndexDefinition::on_field("success")))
            .upgrade(
                "mark legacy inference records successful",
                &[INFERENCE_RECORDS],
                default_inference_success,
            ),
        SchemaVersion::new(11).upgrade(
            "derive virtue profile from aspect profile",
            &[USER_IDENTITY],
            migrate_identity_virtues,
        ),
        SchemaVersion::new(12)
            .table(
                TableShape::documents(MATCH_PROFILES)
                    .index(IndexDefinition::on_field("analysis_phase")),
            )
            .upgrade(
                "derive virtues11 from match aspect scores",
                &[USER_IDENTITY, MATCH_PROFILES],
                migrate_match_virtues11,
            ),
    ]
}

/// Insert `default` when `key` is absent (or null when `replace_null`)
fn ensure_field(doc: &mut Value, key: &str, default: Value, replace_null: bool) {
    if let Some(object) = doc.as_object_mut() {
        let missing = match object.get(key) {
            None => true,
            Some(Value::Null) => replace_null,
            Some(_) => false,
        };
        if missing {
            object.insert(key.to_string(), default);
        }
    }
}

fn default_analysis_phase(ctx: &mut UpgradeContext) -> Result<()> {
    let changed = ctx.table(MATCH_PROFILES)?.modify(|_, doc| {
        ensure_field(doc, "analysis_phase", json!("complete"), true);
    });
    info!("  analysis_phase defaulted on {} profiles", changed);
    Ok(())
}

fn default_identity_arrays(ctx: &mut UpgradeContext) -> Result<()> {
    ctx.table(USER_IDENTITY)?.modify(|_, doc| {
        for key in ["data_exports", "text_inputs", "video_frames", "photos", "insight_feedback"] {
            ensure_field(doc, key, json!([]), true);
        }
    });
    Ok(())
}

/// Old releases stored analysis either as a bare string or as an untagged object
fn tagged_analysis(analysis: Option<&Value>) -> Option<Value> {
    match analysis {
        None | Some(Value::Null) => Some(json!({ "kind": "raw_fallback", "text": "" })),
        Some(Value::String(text)) => Some(json!({ "kind": "raw_fallback", "text": text })),
        Some(Value::Object(object)) if object.contains_key("kind") => None,
        Some(Value::Object(object)) => {
            let structured = object.contains_key("psychological_profile")
                || object.contains_key("photos")
                || object.contains_key("prompts");
            let mut tagged: Map<String, Value> = object.clone();
            let kind = if structured { "structured" } else { "legacy" };
            tagged.insert("kind".to_string(), json!(kind));
            Some(Value::Object(tagged))
        }
        Some(other) => Some(json!({ "kind": "raw_fallback", "text": other.to_string() })),
    }
}

fn tag_analysis(ctx: &mut UpgradeContext) -> Result<()> {
    let changed = ctx.table(MATCH_PROFILES)?.modify(|_, doc| {
        let Some(object) = doc.as_object_mut() else {
            return;
        };
        if let Some(tagged) = tagged_analysis(object.get("analysis")) {
            object.insert("analysis".to_string(), tagged);
        }
    });
    info!("  analysis tagged on {} profiles", changed);
    Ok(())
}

fn default_identity_settings(ctx: &mut UpgradeContext) -> Result<()> {
    ctx.table(USER_IDENTITY)?.modify(|_, doc| {
        ensure_field(doc, "settings", json!({}), true);
        if let Some(settings) = doc.get_mut("settings") {
            ensure_field(settings, "coaching_tone", json!("balanced"), true);
            ensure_field(settings, "auto_generate_compatibility", json!(true), true);
        }
    });
    Ok(())
}

fn default_coaching_fields(ctx: &mut UpgradeContext) -> Result<()> {
    ctx.table(COACHING_SESSIONS)?.modify(|_, doc| {
        ensure_field(doc, "tactics", json!([]), true);
        ensure_field(doc, "outcome_score", Value::Null, false);
    });
    Ok(())
}

fn default_inference_success(ctx: &mut UpgradeContext) -> Result<()> {
    ctx.table(INFERENCE_RECORDS)?.modify(|_, doc| {
        ensure_field(doc, "success", json!(true), true);
    });
    Ok(())
}

/// Parse a nested field, treating absent/null/malformed as `None`
fn parse_field<T: serde::de::DeserializeOwned>(value: Option<&Value>, what: &str) -> Option<T> {
    match value {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("  skipping malformed {}: {}", what, e);
                None
            }
        },
    }
}

fn migrate_identity_virtues(ctx: &mut UpgradeContext) -> Result<()> {
    let mut migrated = 0;
    let mut failure = None;

    ctx.table(USER_IDENTITY)?.modify(|_, doc| {
        let Some(synthesis) = doc.get_mut("synthesis").and_then(Value::as_object_mut) else {
            return;
        };
        if synthesis.get("virtue_profile").is_some_and(|v| !v.is_null()) {
            return;
        }
        let Some(aspects) =
            parse_field::<AspectProfile>(synthesis.get("aspect_profile"), "aspect_profile")
        else {
            return;
        };
        if !can_migrate_aspect_profile(&aspects) {
            return;
        }
        match serde_json::to_value(migrate_aspect_profile_to_virtues(&aspects)) {
            Ok(virtues) => {
                synthesis.insert("virtue_profile".to_string(), virtues);
                migrated += 1;
            }
            Err(e) => failure = Some(e),
        }
    });

    if let Some(e) = failure {
        return Err(e.into());
    }
    info!("  virtue profile derived for {} identities", migrated);
    Ok(())
}

fn migrate_match_virtues11(ctx: &mut UpgradeContext) -> Result<()> {
    let user_profile: Option<VirtueProfile> = ctx
        .table(USER_IDENTITY)?
        .get(IDENTITY_ID)
        .and_then(|doc| doc.get("synthesis"))
        .and_then(|synthesis| parse_field(synthesis.get("virtue_profile"), "virtue_profile"));

    let Some(user_profile) = user_profile else {
        info!("  no user virtue profile - match virtues11 left for generation");
        return Ok(());
    };

    let mut migrated = 0;
    let mut failure = None;

    ctx.table(MATCH_PROFILES)?.modify(|id, doc| {
        if doc.get("virtues11").is_some_and(|v| !v.is_null()) {
            return;
        }
        let Some(aspect_scores) =
            parse_field::<AspectCompatibility>(doc.get("aspect_scores"), "aspect_scores")
        else {
            return;
        };
        if !can_migrate_aspect_scores(&aspect_scores, Some(&user_profile)) {
            return;
        }
        match serde_json::to_value(migrate_aspect_scores_to_virtues11(&aspect_scores, &user_profile)) {
            Ok(virtues11) => {
                let Some(object) = doc.as_object_mut() else {
                    return;
                };
                object.insert("virtues11".to_string(), virtues11);
                migrated += 1;
            }
            Err(e) => {
                warn!("  profile {}: could not encode virtues11", id);
                failure = Some(e);
            }
        }
    });

    if let Some(e) = failure {
        return Err(e.into());
    }
    info!("  virtues11 derived for {} profiles", migrated);
    Ok(())
}
