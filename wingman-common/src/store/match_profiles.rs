//! Match profile records

use super::{decode, merge_fields, to_document, ArtifactStore};
use crate::db::{COACHING_SESSIONS, MATCH_PROFILES};
use crate::events::StoreEvent;
use crate::models::{AnalysisPhase, MatchProfile, MatchProfilePatch};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{info, warn};

fn profile_from_row(row: &SqliteRow) -> Result<MatchProfile> {
    let id: i64 = row.try_get("id")?;
    let doc: String = row.try_get("doc")?;
    let mut profile: MatchProfile = decode(MATCH_PROFILES, id, &doc)?;
    profile.id = id;
    profile.thumbnail = row.try_get("thumbnail")?;
    Ok(profile)
}

/// Set the phase unless the stored one is already later; false when skipped
///
/// Runs as the first statement of the write transaction so the comparison
/// and the write happen under one lock.
async fn advance_phase(
    conn: &mut SqliteConnection,
    id: i64,
    requested: AnalysisPhase,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE match_profiles SET doc = json_set(doc, '$.analysis_phase', ?) \
         WHERE id = ? AND COALESCE(CASE json_extract(doc, '$.analysis_phase') \
           WHEN 'quick' THEN 0 WHEN 'deep' THEN 1 WHEN 'complete' THEN 2 END, -1) <= ?",
    )
    .bind(requested.as_str())
    .bind(id)
    .bind(requested.rank())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

impl ArtifactStore {
    /// Save a new profile; returns its key
    pub async fn add_match_profile(&self, profile: &MatchProfile) -> Result<i64> {
        let doc = to_document(profile)?;

        let result = sqlx::query("INSERT INTO match_profiles (doc, thumbnail) VALUES (?, ?)")
            .bind(serde_json::to_string(&doc)?)
            .bind(profile.thumbnail.as_deref())
            .execute(self.pool())
            .await?;
        let id = result.last_insert_rowid();

        info!(profile_id = id, phase = profile.analysis_phase.as_str(), "Saved match profile");
        self.emit(StoreEvent::MatchProfileAdded { id });
        Ok(id)
    }

    pub async fn get_match_profile(&self, id: i64) -> Result<Option<MatchProfile>> {
        let row = sqlx::query("SELECT id, doc, thumbnail FROM match_profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    /// All profiles, newest first
    pub async fn list_match_profiles(&self) -> Result<Vec<MatchProfile>> {
        let rows = sqlx::query(
            "SELECT id, doc, thumbnail FROM match_profiles \
             ORDER BY json_extract(doc, '$.created_at') DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(profile_from_row).collect()
    }

    /// Shallow-merge `patch` into profile `id`
    ///
    /// A patch that would move `analysis_phase` backwards has that field
    /// dropped; the remaining fields still merge. The phase comparison runs
    /// inside the same write statement, so concurrent writers cannot regress it.
    pub async fn update_match_profile(&self, id: i64, patch: &MatchProfilePatch) -> Result<()> {
        let mut fields = to_document(patch)?;
        fields.remove("analysis_phase");

        let mut tx = self.pool().begin().await?;
        let advanced = match patch.analysis_phase {
            Some(requested) => Some(advance_phase(&mut *tx, id, requested).await?),
            None => None,
        };
        let changed = merge_fields(&mut *tx, MATCH_PROFILES, id, &fields).await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("match profile {}", id)));
        }
        if let Some(thumbnail) = &patch.thumbnail {
            sqlx::query("UPDATE match_profiles SET thumbnail = ? WHERE id = ?")
                .bind(thumbnail.as_slice())
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        if advanced == Some(false) {
            warn!(
                profile_id = id,
                "Ignoring analysis_phase regression to {:?}", patch.analysis_phase
            );
        }
        self.emit(StoreEvent::MatchProfileUpdated { id });
        Ok(())
    }

    /// Remove a profile
    ///
    /// Coaching sessions referencing it are kept; see [`Self::orphaned_session_count`].
    pub async fn delete_match_profile(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM match_profiles WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("match profile {}", id)));
        }

        info!(profile_id = id, "Deleted match profile");
        self.emit(StoreEvent::MatchProfileDeleted { id });
        Ok(())
    }

    /// Coaching sessions whose profile no longer exists
    pub async fn orphaned_session_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {sessions} s WHERE NOT EXISTS \
             (SELECT 1 FROM {profiles} p WHERE p.id = json_extract(s.doc, '$.profile_id'))",
            sessions = COACHING_SESSIONS,
            profiles = MATCH_PROFILES,
        ))
        .fetch_one(self.pool())
        .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectCompatibility, ProfileAnalysis};

    fn raw_profile(name: &str, phase: AnalysisPhase) -> MatchProfile {
        MatchProfile::new(
            name,
            ProfileAnalysis::RawFallback {
                text: format!("{} likes hiking", name),
            },
            phase,
        )
    }

    #[tokio::test]
    async fn test_add_assigns_distinct_keys() {
        let store = ArtifactStore::open_in_memory().await.unwrap();
        let first = store.add_match_profile(&raw_profile("Ana", AnalysisPhase::Complete)).await.unwrap();
        let second = store.add_match_profile(&raw_profile("Bea", AnalysisPhase::Complete)).await.unwrap();
        assert_ne!(first, second);

        let loaded = store.get_match_profile(second).await.unwrap().unwrap();
        assert_eq!(loaded.id, second);
        assert_eq!(loaded.name, "Bea");
        assert!(store.get_match_profile(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_other_fields() {
        let store = ArtifactStore::open_in_memory().await.unwrap();
        let mut profile = raw_profile("Cleo", AnalysisPhase::Deep);
        profile.app_source = Some("hinge".to_string());
        profile.thumbnail = Some(vec![1, 2, 3]);
        let id = store.add_match_profile(&profile).await.unwrap();

        let patch = MatchProfilePatch {
            aspect_scores: Some(AspectCompatibility {
                scores: Vec::new(),
                overall_score: 7.0,
                summary: "good".to_string(),
                generated_at: None,
            }),
            ..Default::default()
        };
        store.update_match_profile(id, &patch).await.unwrap();

        let loaded = store.get_match_profile(id).await.unwrap().unwrap();
        assert_eq!(loaded.app_source.as_deref(), Some("hinge"));
        assert_eq!(loaded.thumbnail, Some(vec![1, 2, 3]));
        assert_eq!(loaded.aspect_scores.unwrap().overall_score, 7.0);
        assert_eq!(loaded.analysis, profile.analysis);
    }

    #[tokio::test]
    async fn test_phase_never_regresses() {
        let store = ArtifactStore::open_in_memory().await.unwrap();
        let id = store.add_match_profile(&raw_profile("Dee", AnalysisPhase::Deep)).await.unwrap();

        let patch = MatchProfilePatch {
            analysis_phase: Some(AnalysisPhase::Quick),
            age: Some(33),
            ..Default::default()
        };
        store.update_match_profile(id, &patch).await.unwrap();
        let loaded = store.get_match_profile(id).await.unwrap().unwrap();
        assert_eq!(loaded.analysis_phase, AnalysisPhase::Deep);
        assert_eq!(loaded.age, Some(33));

        let patch = MatchProfilePatch {
            analysis_phase: Some(AnalysisPhase::Complete),
            ..Default::default()
        };
        store.update_match_profile(id, &patch).await.unwrap();
        let loaded = store.get_match_profile(id).await.unwrap().unwrap();
        assert_eq!(loaded.analysis_phase, AnalysisPhase::Complete);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_phase_never_regresses_under_concurrent_writers() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::open(&dir.path().join("wingman.db")).await.unwrap();

        for round in 0..40 {
            let id = store
                .add_match_profile(&raw_profile(&format!("Gia{}", round), AnalysisPhase::Quick))
                .await
                .unwrap();

            let complete = {
                let store = store.clone();
                tokio::spawn(async move {
                    let patch = MatchProfilePatch {
                        analysis_phase: Some(AnalysisPhase::Complete),
                        ..Default::default()
                    };
                    store.update_match_profile(id, &patch).await
                })
            };
            let deep = {
                let store = store.clone();
                tokio::spawn(async move {
                    let patch = MatchProfilePatch {
                        analysis_phase: Some(AnalysisPhase::Deep),
                        age: Some(30),
                        ..Default::default()
                    };
                    store.update_match_profile(id, &patch).await
                })
            };
            complete.await.unwrap().unwrap();
            deep.await.unwrap().unwrap();

            let loaded = store.get_match_profile(id).await.unwrap().unwrap();
            assert_eq!(loaded.analysis_phase, AnalysisPhase::Complete, "round {}", round);
            assert_eq!(loaded.age, Some(30));
        }
    }

    #[tokio::test]
    async fn test_update_missing_profile_is_not_found() {
        let store = ArtifactStore::open_in_memory().await.unwrap();
        let result = store.update_match_profile(42, &MatchProfilePatch::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(matches!(store.delete_match_profile(42).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_events_emitted_for_writes() {
        let store = ArtifactStore::open_in_memory().await.unwrap();
        let mut rx = store.events().subscribe();

        let id = store.add_match_profile(&raw_profile("Eve", AnalysisPhase::Quick)).await.unwrap();
        store.delete_match_profile(id).await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), StoreEvent::MatchProfileAdded { id });
        assert_eq!(rx.try_recv().unwrap(), StoreEvent::MatchProfileDeleted { id });
    }
}
