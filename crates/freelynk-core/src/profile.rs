//! Authenticated profile cache
//!
//! A last-known-good snapshot of the signed-in user's profile, kept so a
//! process restart can render immediately instead of waiting on the
//! remote store. Invalidated explicitly on logout.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};

/// The signed-in user's profile row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    /// Public handle (e.g. `FL-ABC-1234`)
    pub handle: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
}

/// Memoized snapshot of the authenticated profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileCache {
    snapshot: Option<UserProfile>,
    cached_at: Option<Timestamp>,
}

impl ProfileCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh snapshot
    pub fn store(&mut self, profile: UserProfile) {
        self.snapshot = Some(profile);
        self.cached_at = Some(Timestamp::now());
    }

    /// The last known good profile, if any
    pub fn get(&self) -> Option<&UserProfile> {
        self.snapshot.as_ref()
    }

    /// When the snapshot was taken
    pub fn cached_at(&self) -> Option<Timestamp> {
        self.cached_at
    }

    /// Drop the snapshot (logout)
    pub fn invalidate(&mut self) {
        self.snapshot = None;
        self.cached_at = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile() -> UserProfile {
        UserProfile {
            id: UserId::random(),
            handle: "FL-TST-0001".to_string(),
            name: "Test".to_string(),
            photo_url: None,
            bio: None,
        }
    }

    #[test]
    fn test_store_and_get() {
        let mut cache = ProfileCache::new();
        assert!(cache.get().is_none());

        let profile = test_profile();
        cache.store(profile.clone());
        assert_eq!(cache.get(), Some(&profile));
        assert!(cache.cached_at().is_some());
    }

    #[test]
    fn test_invalidate_clears_snapshot() {
        let mut cache = ProfileCache::new();
        cache.store(test_profile());
        cache.invalidate();
        assert!(cache.get().is_none());
        assert!(cache.cached_at().is_none());
    }
}
