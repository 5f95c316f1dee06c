//! Coaching session history

use super::{decode, merge_fields, to_document, ArtifactStore};
use crate::db::COACHING_SESSIONS;
use crate::events::StoreEvent;
use crate::models::CoachingSession;
use crate::{Error, Result};
use serde_json::{json, Map};
use sqlx::Row;
use tracing::info;

impl ArtifactStore {
    /// Append a coaching session; returns its key
    pub async fn add_coaching_session(&self, session: &CoachingSession) -> Result<i64> {
        let doc = serde_json::Value::Object(to_document(session)?);
        let id = self.insert_doc(COACHING_SESSIONS, &doc).await?;

        info!(session_id = id, profile_id = session.profile_id, "Saved coaching session");
        self.emit(StoreEvent::CoachingSessionAdded {
            id,
            profile_id: session.profile_id,
        });
        Ok(id)
    }

    pub async fn get_coaching_session(&self, id: i64) -> Result<Option<CoachingSession>> {
        let Some(doc) = self.fetch_doc(COACHING_SESSIONS, id).await? else {
            return Ok(None);
        };
        let mut session: CoachingSession = decode(COACHING_SESSIONS, id, &doc)?;
        session.id = id;
        Ok(Some(session))
    }

    /// Sessions for one profile, oldest first
    pub async fn coaching_sessions_for(&self, profile_id: i64) -> Result<Vec<CoachingSession>> {
        let rows = sqlx::query(
            "SELECT id, doc FROM coaching_sessions \
             WHERE json_extract(doc, '$.profile_id') = ? ORDER BY id",
        )
        .bind(profile_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let doc: String = row.try_get("doc")?;
                let mut session: CoachingSession = decode(COACHING_SESSIONS, id, &doc)?;
                session.id = id;
                Ok(session)
            })
            .collect()
    }

    /// Record the response the user actually sent and how it landed (1-10)
    pub async fn record_outcome(&self, id: i64, sent_response: &str, score: u8) -> Result<()> {
        if !(1..=10).contains(&score) {
            return Err(Error::InvalidInput(format!(
                "outcome score must be 1-10, got {}",
                score
            )));
        }

        let mut fields = Map::new();
        fields.insert("sent_response".to_string(), json!(sent_response));
        fields.insert("outcome_score".to_string(), json!(score));

        let mut conn = self.pool().acquire().await?;
        if merge_fields(&mut conn, COACHING_SESSIONS, id, &fields).await? == 0 {
            return Err(Error::NotFound(format!("coaching session {}", id)));
        }
        self.emit(StoreEvent::CoachingSessionUpdated { id });
        Ok(())
    }
}
