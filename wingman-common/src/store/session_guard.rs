use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Once-per-session claim set
///
/// Lives for the process only; a fresh session starts with nothing claimed.
/// Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct SessionGuard {
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`; true only for the first caller this session
    pub fn claim(&self, key: impl Into<String>) -> bool {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        claimed.insert(key.into())
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        let claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        claimed.contains(key)
    }
}
