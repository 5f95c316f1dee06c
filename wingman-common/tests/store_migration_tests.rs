//! Integration tests for opening legacy stores
//!
//! Each test builds a store file the way an older release left it (tables
//! created by hand, no `schema_version` table, documents in their old shape),
//! then opens it through `ArtifactStore` and checks what the upgrade chain did.

use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tempfile::TempDir;
use wingman_common::compat_migration::{ASPECT_IDS, VIRTUE_IDS};
use wingman_common::db::{schema_versions, SchemaMigrator, SchemaVersion, CURRENT_SCHEMA_VERSION};
use wingman_common::models::AnalysisPhase;
use wingman_common::{ArtifactStore, Error};

async fn legacy_pool(path: &Path) -> SqlitePool {
    let url = format!("sqlite://{}?mode=rwc", path.display());
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap()
}

async fn create_legacy_table(pool: &SqlitePool, table: &str) {
    sqlx::query(&format!(
        "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, doc TEXT NOT NULL DEFAULT '{{}}')",
        table
    ))
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_legacy(pool: &SqlitePool, table: &str, id: i64, doc: Value) {
    sqlx::query(&format!("INSERT INTO {} (id, doc) VALUES (?, ?)", table))
        .bind(id)
        .bind(doc.to_string())
        .execute(pool)
        .await
        .unwrap();
}

async fn read_doc(store: &ArtifactStore, table: &str, id: i64) -> Value {
    let raw: String = sqlx::query_scalar(&format!("SELECT doc FROM {} WHERE id = ?", table))
        .bind(id)
        .fetch_one(store.pool())
        .await
        .unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn legacy_aspect_profile() -> Value {
    let scores: Vec<Value> = ASPECT_IDS
        .iter()
        .enumerate()
        .map(|(i, id)| json!({"aspect_id": id, "score": 3.0 + (i % 7) as f64, "evidence": format!("seen {}", id)}))
        .collect();
    json!({"scores": scores, "summary": "legacy read"})
}

fn legacy_match_aspect_scores() -> Value {
    let scores: Vec<Value> = ASPECT_IDS
        .iter()
        .map(|id| json!({"aspect_id": id, "partner_score": 6.0, "rationale": format!("partner {}", id)}))
        .collect();
    json!({"scores": scores, "overall_score": 6.0, "summary": "solid overlap"})
}

#[tokio::test]
async fn test_scenario_a_identity_aspect_profile_upgraded() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wingman.db");

    let pool = legacy_pool(&db_path).await;
    create_legacy_table(&pool, "user_identity").await;
    let aspect_profile = legacy_aspect_profile();
    insert_legacy(
        &pool,
        "user_identity",
        1,
        json!({"synthesis": {"summary": "Curious", "aspect_profile": aspect_profile}}),
    )
    .await;
    pool.close().await;

    let store = ArtifactStore::open(&db_path).await.unwrap();
    assert_eq!(store.schema_version(), CURRENT_SCHEMA_VERSION);

    let doc = read_doc(&store, "user_identity", 1).await;
    assert_eq!(doc["synthesis"]["aspect_profile"], aspect_profile);

    let virtue_scores = doc["synthesis"]["virtue_profile"]["scores"].as_array().unwrap();
    assert_eq!(virtue_scores.len(), VIRTUE_IDS.len());
    for score in virtue_scores {
        let value = score["score"].as_f64().unwrap();
        assert!((0.0..=10.0).contains(&value));
        assert!(!score["evidence"].as_str().unwrap().is_empty());
    }

    let identity = store.identity().get().await.unwrap().unwrap();
    assert!(identity.virtue_profile().is_some());
}

#[tokio::test]
async fn test_every_row_carries_all_migrated_fields() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wingman.db");

    let pool = legacy_pool(&db_path).await;
    for table in ["match_profiles", "user_identity", "coaching_sessions", "inference_records"] {
        create_legacy_table(&pool, table).await;
    }
    insert_legacy(&pool, "user_identity", 1, json!({"synthesis": {"aspect_profile": legacy_aspect_profile()}})).await;
    insert_legacy(
        &pool,
        "match_profiles",
        1,
        json!({"name": "Ana", "created_at": "2024-03-01T10:00:00Z", "analysis": "Likes climbing"}),
    )
    .await;
    insert_legacy(
        &pool,
        "match_profiles",
        2,
        json!({
            "name": "Bea",
            "created_at": "2024-04-01T10:00:00Z",
            "analysis": {"summary": "Bookish", "green_flags": ["kind"], "red_flags": [], "openers": ["Last good read?"]},
            "analysis_phase": "deep",
            "aspect_scores": legacy_match_aspect_scores()
        }),
    )
    .await;
    insert_legacy(
        &pool,
        "coaching_sessions",
        1,
        json!({"profile_id": 1, "created_at": "2024-03-02T10:00:00Z", "conversation": []}),
    )
    .await;
    insert_legacy(
        &pool,
        "inference_records",
        1,
        json!({"feature": "deep_analysis", "input_tokens": 10, "output_tokens": 5, "created_at": "2024-03-01T10:00:00Z"}),
    )
    .await;
    pool.close().await;

    let store = ArtifactStore::open(&db_path).await.unwrap();
    assert_eq!(store.schema_version(), CURRENT_SCHEMA_VERSION);

    let recorded: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(recorded, (1..=CURRENT_SCHEMA_VERSION as i64).collect::<Vec<_>>());

    let identity = read_doc(&store, "user_identity", 1).await;
    for key in ["data_exports", "text_inputs", "video_frames", "photos", "insight_feedback"] {
        assert_eq!(identity[key], json!([]), "identity.{}", key);
    }
    assert_eq!(identity["settings"]["coaching_tone"], "balanced");
    assert!(identity["synthesis"]["virtue_profile"].is_object());

    let ana = read_doc(&store, "match_profiles", 1).await;
    assert_eq!(ana["analysis_phase"], "complete");
    assert_eq!(ana["analysis"], json!({"kind": "raw_fallback", "text": "Likes climbing"}));
    assert!(ana.get("virtues11").is_none(), "no aspect scores to derive from");

    let bea = read_doc(&store, "match_profiles", 2).await;
    assert_eq!(bea["analysis_phase"], "deep");
    assert_eq!(bea["analysis"]["kind"], "legacy");
    assert_eq!(bea["virtues11"]["scores"].as_array().unwrap().len(), 11);
    assert_eq!(bea["virtues11"]["summary"], "solid overlap");
    assert!(bea["aspect_scores"].is_object());

    let session = read_doc(&store, "coaching_sessions", 1).await;
    assert_eq!(session["tactics"], json!([]));
    assert!(session.as_object().unwrap().contains_key("outcome_score"));

    let record = read_doc(&store, "inference_records", 1).await;
    assert_eq!(record["success"], json!(true));

    // typed reads agree with the raw documents
    let profiles = store.list_match_profiles().await.unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].name, "Bea");
    assert_eq!(profiles[0].analysis_phase, AnalysisPhase::Deep);
    assert!(profiles[0].virtues11.is_some());
    assert_eq!(profiles[1].analysis.summary(), "Likes climbing");
}

#[tokio::test]
async fn test_reopen_runs_nothing_and_keeps_data() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("wingman.db");

    let store = ArtifactStore::open(&db_path).await.unwrap();
    let identity = store.identity();
    identity
        .update(&wingman_common::models::IdentityPatch {
            photos: Some(vec!["me.jpg".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    store.pool().close().await;

    let reopened = ArtifactStore::open(&db_path).await.unwrap();
    assert_eq!(reopened.schema_version(), CURRENT_SCHEMA_VERSION);
    let loaded = reopened.identity().get().await.unwrap().unwrap();
    assert_eq!(loaded.photos, vec!["me.jpg".to_string()]);
}

#[tokio::test]
async fn test_interrupted_chain_resumes_from_recorded_version() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wingman.db");

    let partial: Vec<SchemaVersion> = schema_versions().into_iter().take(6).collect();
    let store = ArtifactStore::open_with(&db_path, &partial).await.unwrap();
    assert_eq!(store.schema_version(), 6);
    store.pool().close().await;

    let store = ArtifactStore::open(&db_path).await.unwrap();
    assert_eq!(store.schema_version(), CURRENT_SCHEMA_VERSION);

    let thumbnail_columns: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('match_profiles') WHERE name = 'thumbnail'",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(thumbnail_columns, 1);
}

#[tokio::test]
async fn test_gap_in_chain_refuses_to_open() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wingman.db");

    let mut descriptors = schema_versions();
    descriptors.remove(4);
    let result = ArtifactStore::open_with(&db_path, &descriptors).await;
    assert!(matches!(result, Err(Error::SchemaChain(_))));
    assert!(SchemaMigrator::validate_chain(&schema_versions()).is_ok());
}

#[tokio::test]
async fn test_non_object_documents_survive_the_upgrade() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("wingman.db");

    let pool = legacy_pool(&db_path).await;
    for table in ["match_profiles", "user_identity"] {
        create_legacy_table(&pool, table).await;
    }
    insert_legacy(&pool, "user_identity", 1, json!("settings were never written")).await;
    insert_legacy(&pool, "match_profiles", 1, json!(["Ana", 29])).await;
    insert_legacy(&pool, "match_profiles", 2, json!("Bea likes climbing")).await;
    pool.close().await;

    let store = ArtifactStore::open(&db_path).await.unwrap();
    assert_eq!(store.schema_version(), CURRENT_SCHEMA_VERSION);
    assert_eq!(read_doc(&store, "user_identity", 1).await, json!("settings were never written"));
    assert_eq!(read_doc(&store, "match_profiles", 1).await, json!(["Ana", 29]));
    assert_eq!(read_doc(&store, "match_profiles", 2).await, json!("Bea likes climbing"));
}
