//! Per-profile generation of one artifact kind
//!
//! At most one generation runs per cache instance. The guard is a local
//! flag, so two caches for the same profile can still race each other.
//!
//! [`GeneratedArtifactCache::watch`] keeps the published state in step with
//! the store: any write to the profile or the identity recomputes `data`
//! and `can_generate`.

use super::{ArtifactKind, CacheState, Snapshot};
use crate::error::{CacheError, CacheErrorCategory};
use crate::inference::{InferenceRequest, InferenceService};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wingman_common::models::{MatchProfile, UserIdentity};
use wingman_common::{ArtifactStore, IdentityRepository, StoreEvent};

/// Clears the in-flight flag however generation ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Generated artifact of kind `K` for one match profile
pub struct GeneratedArtifactCache<K: ArtifactKind> {
    store: ArtifactStore,
    identity: IdentityRepository,
    inference: Arc<dyn InferenceService>,
    profile_id: i64,
    in_flight: AtomicBool,
    current: Mutex<Option<CancellationToken>>,
    state: watch::Sender<CacheState<K::Artifact>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ArtifactKind> GeneratedArtifactCache<K> {
    pub fn new(store: ArtifactStore, inference: Arc<dyn InferenceService>, profile_id: i64) -> Self {
        let (state, _) = watch::channel(CacheState::default());
        Self {
            identity: store.identity(),
            store,
            inference,
            profile_id,
            in_flight: AtomicBool::new(false),
            current: Mutex::new(None),
            state,
            _kind: PhantomData,
        }
    }

    pub fn profile_id(&self) -> i64 {
        self.profile_id
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn identity(&self) -> &IdentityRepository {
        &self.identity
    }

    /// Current state snapshot
    pub fn state(&self) -> CacheState<K::Artifact> {
        self.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<CacheState<K::Artifact>> {
        self.state.subscribe()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Reload profile and identity and recompute `data` / `can_generate`
    pub async fn refresh(&self) {
        match self.load().await {
            Ok((profile, identity)) => self.publish(&profile, &identity),
            Err(e) => self.state.send_modify(|state| state.error = Some(e)),
        }
    }

    /// Prerequisites exist and no artifact is stored yet
    pub async fn can_generate(&self) -> bool {
        match self.load().await {
            Ok((profile, identity)) => K::can_generate(&profile, &identity),
            Err(_) => false,
        }
    }

    /// Auto-generation inputs as currently stored
    ///
    /// Also republishes `data` and `can_generate` from the loaded records.
    pub async fn snapshot(&self) -> Result<Snapshot, CacheError> {
        let (profile, identity) = self.load().await?;
        self.publish(&profile, &identity);
        Ok(Snapshot::capture::<K>(&profile, &identity))
    }

    /// Store change that can alter this cache's state
    pub fn is_relevant(&self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::IdentityChanged => true,
            StoreEvent::MatchProfileAdded { id }
            | StoreEvent::MatchProfileUpdated { id }
            | StoreEvent::MatchProfileDeleted { id } => *id == self.profile_id,
            _ => false,
        }
    }

    /// Refresh the published state on every relevant store change
    ///
    /// Runs until `cancel` fires or the store's event bus closes.
    pub async fn watch(&self, cancel: &CancellationToken) {
        let mut events = self.store.events().subscribe();
        self.refresh().await;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(event) if self.is_relevant(&event) => self.refresh().await,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(kind = K::NAME, skipped, "Cache watcher lagged, refreshing");
                    self.refresh().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(kind = K::NAME, profile_id = self.profile_id, "Cache watcher stopped");
    }

    /// Run [`Self::watch`] on a background task
    pub fn spawn_watch(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.watch(&cancel).await })
    }

    /// Generate and store the artifact
    ///
    /// No-op when `can_generate` is false or a generation is already in
    /// flight. Failures land in the state's `error`; nothing is returned.
    pub async fn generate(&self) {
        self.run(false).await
    }

    /// Generate even if an artifact is already stored
    pub async fn regenerate(&self) {
        self.run(true).await
    }

    /// Cancel the in-flight generation, if any
    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }

    async fn run(&self, force: bool) {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(kind = K::NAME, profile_id = self.profile_id, "Generation already in flight");
            return;
        }
        let _in_flight = InFlight(&self.in_flight);

        let (profile, identity) = match self.load().await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.state.send_modify(|state| state.error = Some(e));
                return;
            }
        };

        let eligible = if force {
            K::prerequisites_met(&profile, &identity)
        } else {
            K::can_generate(&profile, &identity)
        };
        let prompt = match K::prompt(&profile, &identity) {
            Some(prompt) if eligible => prompt,
            _ => {
                debug!(kind = K::NAME, profile_id = self.profile_id, "Nothing to generate");
                self.publish(&profile, &identity);
                return;
            }
        };

        info!(kind = K::NAME, profile_id = self.profile_id, "Generating artifact");
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });

        let cancel = CancellationToken::new();
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());
        let result = self.produce(prompt, &cancel).await;
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let artifact = match result {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(kind = K::NAME, profile_id = self.profile_id, "Generation failed: {}", e);
                self.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(e);
                });
                return;
            }
        };

        if let Err(e) = self.store.update_match_profile(self.profile_id, &K::patch(artifact.clone())).await {
            warn!(kind = K::NAME, profile_id = self.profile_id, "Failed to store artifact: {}", e);
            self.state.send_modify(|state| {
                state.is_loading = false;
                state.error = Some(CacheError::from(e));
            });
            return;
        }

        self.state.send_modify(|state| {
            state.data = Some(artifact);
            state.is_loading = false;
            state.can_generate = false;
        });
        info!(kind = K::NAME, profile_id = self.profile_id, "Artifact stored");
    }

    async fn produce(
        &self,
        prompt: String,
        cancel: &CancellationToken,
    ) -> Result<K::Artifact, CacheError> {
        let response = self
            .inference
            .infer(InferenceRequest::new(K::TASK, prompt), cancel)
            .await?;
        Ok(response.parse::<K::Artifact>()?)
    }

    async fn load(&self) -> Result<(MatchProfile, UserIdentity), CacheError> {
        let profile = self
            .store
            .get_match_profile(self.profile_id)
            .await?
            .ok_or_else(|| {
                CacheError::new(
                    CacheErrorCategory::Store,
                    format!("match profile {} not found", self.profile_id),
                )
            })?;
        let identity = self.identity.get_or_default().await?;
        Ok((profile, identity))
    }

    fn publish(&self, profile: &MatchProfile, identity: &UserIdentity) {
        let data = K::cached(profile).cloned();
        let can_generate = K::can_generate(profile, identity);
        self.state.send_modify(|state| {
            state.data = data;
            state.can_generate = can_generate;
        });
    }
}
