//! Once-per-session auto-generation
//!
//! Store-change events feed a pure [`should_trigger`] predicate over
//! consecutive [`Snapshot`]s; the side effect only runs after a
//! [`SessionGuard`] claim succeeds. Re-emitted events that carry the same
//! snapshot never trigger twice, and the guard stops a second trigger for the
//! same profile even across watcher restarts. A new session starts unguarded.

use super::{ArtifactKind, GeneratedArtifactCache};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wingman_common::models::{MatchProfile, UserIdentity};
use wingman_common::{SessionGuard, StoreEvent};

/// Auto-generation inputs at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// `settings.auto_generate_compatibility`
    pub enabled: bool,
    pub prerequisites_met: bool,
    pub has_artifact: bool,
}

impl Snapshot {
    pub fn capture<K: ArtifactKind>(profile: &MatchProfile, identity: &UserIdentity) -> Self {
        Self {
            enabled: identity.settings.auto_generate_compatibility,
            prerequisites_met: K::prerequisites_met(profile, identity),
            has_artifact: K::cached(profile).is_some(),
        }
    }

    fn eligible(&self) -> bool {
        self.enabled && self.prerequisites_met && !self.has_artifact
    }
}

/// Trigger on the first snapshot that becomes eligible
pub fn should_trigger(prev: Option<&Snapshot>, next: &Snapshot) -> bool {
    next.eligible() && !prev.is_some_and(Snapshot::eligible)
}

/// Watches store changes and generates `K` for one profile, once per session
pub struct AutoGenerator<K: ArtifactKind> {
    cache: Arc<GeneratedArtifactCache<K>>,
    guard: SessionGuard,
}

impl<K: ArtifactKind> AutoGenerator<K> {
    pub fn new(cache: Arc<GeneratedArtifactCache<K>>, guard: SessionGuard) -> Self {
        Self { cache, guard }
    }

    fn guard_key(&self) -> String {
        format!("{}:{}", K::NAME, self.cache.profile_id())
    }

    fn relevant(&self, event: &StoreEvent) -> bool {
        !matches!(event, StoreEvent::MatchProfileDeleted { .. }) && self.cache.is_relevant(event)
    }

    /// Evaluate once against `prev`; returns the snapshot to compare the next change with
    pub async fn evaluate(&self, prev: Option<Snapshot>) -> Option<Snapshot> {
        if let Err(e) = self.cache.identity().ensure_virtue_profile(&self.guard).await {
            warn!("Identity virtue migration failed: {}", e);
        }

        let next = match self.cache.snapshot().await {
            Ok(next) => next,
            Err(e) => {
                debug!(kind = K::NAME, profile_id = self.cache.profile_id(), "Snapshot unavailable: {}", e);
                return prev;
            }
        };

        if should_trigger(prev.as_ref(), &next) {
            if self.guard.claim(self.guard_key()) {
                info!(kind = K::NAME, profile_id = self.cache.profile_id(), "Auto-generating");
                self.cache.generate().await;
            } else {
                debug!(kind = K::NAME, profile_id = self.cache.profile_id(), "Already auto-generated this session");
            }
        }
        Some(next)
    }

    /// React to store changes until `cancel` fires or the store closes
    pub async fn watch(&self, cancel: &CancellationToken) {
        let mut events = self.cache.store().events().subscribe();
        let mut prev = self.evaluate(None).await;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) if self.relevant(&event) => prev = self.evaluate(prev).await,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auto-generation watcher lagged, re-evaluating");
                    prev = self.evaluate(prev).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(kind = K::NAME, profile_id = self.cache.profile_id(), "Auto-generation watcher stopped");
    }

    /// Run [`Self::watch`] on a background task
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.watch(&cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELIGIBLE: Snapshot = Snapshot {
        enabled: true,
        prerequisites_met: true,
        has_artifact: false,
    };

    #[test]
    fn test_triggers_on_first_eligible_snapshot() {
        assert!(should_trigger(None, &ELIGIBLE));
        let missing = Snapshot { prerequisites_met: false, ..ELIGIBLE };
        assert!(should_trigger(Some(&missing), &ELIGIBLE));
    }

    #[test]
    fn test_repeated_snapshot_does_not_retrigger() {
        assert!(!should_trigger(Some(&ELIGIBLE), &ELIGIBLE));
    }

    #[test]
    fn test_ineligible_snapshots_never_trigger() {
        let disabled = Snapshot { enabled: false, ..ELIGIBLE };
        let cached = Snapshot { has_artifact: true, ..ELIGIBLE };
        assert!(!should_trigger(None, &disabled));
        assert!(!should_trigger(None, &cached));
        assert!(!should_trigger(Some(&ELIGIBLE), &cached));
    }
}
