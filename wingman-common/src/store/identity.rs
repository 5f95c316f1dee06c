//! The singleton user identity row

use super::{decode, merge_fields, to_document, ArtifactStore, SessionGuard};
use crate::compat_migration::{can_migrate_aspect_profile, migrate_aspect_profile_to_virtues};
use crate::db::USER_IDENTITY;
use crate::events::StoreEvent;
use crate::models::{IdentityPatch, UserIdentity, VirtueProfile, IDENTITY_ID};
use crate::Result;
use tracing::{debug, info};

/// Session guard key for the identity aspect → virtue migration
pub const VIRTUE_PROFILE_GUARD: &str = "identity:virtue_profile";

/// Explicit handle to the user identity (row key 1)
///
/// Components that need the identity take one of these instead of reaching
/// for the table directly.
#[derive(Clone)]
pub struct IdentityRepository {
    store: ArtifactStore,
}

impl IdentityRepository {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    pub async fn get(&self) -> Result<Option<UserIdentity>> {
        let Some(doc) = self.store.fetch_doc(USER_IDENTITY, IDENTITY_ID).await? else {
            return Ok(None);
        };
        let mut identity: UserIdentity = decode(USER_IDENTITY, IDENTITY_ID, &doc)?;
        identity.id = IDENTITY_ID;
        Ok(Some(identity))
    }

    /// Identity, or an empty one when none has been saved yet
    pub async fn get_or_default(&self) -> Result<UserIdentity> {
        Ok(self.get().await?.unwrap_or_else(|| UserIdentity {
            id: IDENTITY_ID,
            ..UserIdentity::default()
        }))
    }

    /// Replace the whole identity document
    pub async fn put(&self, identity: &UserIdentity) -> Result<()> {
        let doc = to_document(identity)?;
        sqlx::query(
            "INSERT INTO user_identity (id, doc) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
        )
        .bind(IDENTITY_ID)
        .bind(serde_json::to_string(&doc)?)
        .execute(self.store.pool())
        .await?;

        self.store.emit(StoreEvent::IdentityChanged);
        Ok(())
    }

    /// Shallow-merge `patch`, creating the row if needed
    pub async fn update(&self, patch: &IdentityPatch) -> Result<()> {
        let fields = to_document(patch)?;

        let mut tx = self.store.pool().begin().await?;
        sqlx::query("INSERT OR IGNORE INTO user_identity (id, doc) VALUES (?, '{}')")
            .bind(IDENTITY_ID)
            .execute(&mut *tx)
            .await?;
        merge_fields(&mut *tx, USER_IDENTITY, IDENTITY_ID, &fields).await?;
        tx.commit().await?;

        self.store.emit(StoreEvent::IdentityChanged);
        Ok(())
    }

    /// Derive `synthesis.virtue_profile` from the legacy aspect profile
    ///
    /// Runs at most once per session (claimed on `guard`) and never replaces
    /// a virtue profile that is already stored, even one written after the
    /// identity was read here. Returns true when a profile was written.
    pub async fn ensure_virtue_profile(&self, guard: &SessionGuard) -> Result<bool> {
        if guard.is_claimed(VIRTUE_PROFILE_GUARD) {
            debug!("Virtue profile migration already ran this session");
            return Ok(false);
        }

        let Some(identity) = self.get().await? else {
            return Ok(false);
        };
        if identity.virtue_profile().is_some() {
            return Ok(false);
        }
        let Some(aspects) = identity.aspect_profile() else {
            return Ok(false);
        };
        if !can_migrate_aspect_profile(aspects) {
            debug!("Aspect profile does not cover every virtue, skipping migration");
            return Ok(false);
        }
        if !guard.claim(VIRTUE_PROFILE_GUARD) {
            return Ok(false);
        }

        let virtues: VirtueProfile = migrate_aspect_profile_to_virtues(aspects);
        let result = sqlx::query(
            "UPDATE user_identity \
             SET doc = json_set(doc, '$.synthesis.virtue_profile', json(?)) \
             WHERE id = ? AND json_type(doc, '$.synthesis') = 'object' \
               AND COALESCE(json_type(doc, '$.synthesis.virtue_profile'), 'null') = 'null'",
        )
        .bind(serde_json::to_string(&virtues)?)
        .bind(IDENTITY_ID)
        .execute(self.store.pool())
        .await?;

        let written = result.rows_affected() > 0;
        if written {
            info!("Derived virtue profile from legacy aspect profile");
            self.store.emit(StoreEvent::IdentityChanged);
        }
        Ok(written)
    }
}
