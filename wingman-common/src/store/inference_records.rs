//! Inference audit log

use super::{decode, to_document, ArtifactStore};
use crate::db::INFERENCE_RECORDS;
use crate::events::StoreEvent;
use crate::models::{InferenceRecord, InferenceUsage};
use crate::Result;
use sqlx::Row;

impl ArtifactStore {
    /// Append an audit entry; returns its key
    pub async fn add_inference_record(&self, record: &InferenceRecord) -> Result<i64> {
        let doc = serde_json::Value::Object(to_document(record)?);
        let id = self.insert_doc(INFERENCE_RECORDS, &doc).await?;
        self.emit(StoreEvent::InferenceRecorded { id });
        Ok(id)
    }

    /// Most recent audit entries, newest first
    pub async fn recent_inference_records(&self, limit: u32) -> Result<Vec<InferenceRecord>> {
        let rows = sqlx::query("SELECT id, doc FROM inference_records ORDER BY id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(self.pool())
            .await?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let doc: String = row.try_get("doc")?;
                let mut record: InferenceRecord = decode(INFERENCE_RECORDS, id, &doc)?;
                record.id = id;
                Ok(record)
            })
            .collect()
    }

    /// Calls, failures and token totals per feature
    pub async fn inference_usage(&self) -> Result<Vec<InferenceUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT json_extract(doc, '$.feature') AS feature,
                   COUNT(*) AS calls,
                   SUM(CASE WHEN json_extract(doc, '$.success') = 0 THEN 1 ELSE 0 END) AS failures,
                   COALESCE(SUM(json_extract(doc, '$.input_tokens')), 0) AS input_tokens,
                   COALESCE(SUM(json_extract(doc, '$.output_tokens')), 0) AS output_tokens
            FROM inference_records
            GROUP BY feature
            ORDER BY feature
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let feature: Option<String> = row.try_get("feature")?;
                Ok(InferenceUsage {
                    feature: feature.unwrap_or_else(|| "unknown".to_string()),
                    calls: row.try_get::<i64, _>("calls")? as u64,
                    failures: row.try_get::<i64, _>("failures")? as u64,
                    input_tokens: row.try_get::<i64, _>("input_tokens")? as u64,
                    output_tokens: row.try_get::<i64, _>("output_tokens")? as u64,
                })
            })
            .collect()
    }
}
