//! Profile lookup seam
//!
//! The user store lives outside this service; the hub only needs to turn an
//! identity claim into a profile carrying a role set.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{
    models::{Profile, UserId},
    Result,
};

/// Maps an identity to the profile stored for it
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// `Ok(None)` when the identity no longer has a stored profile
    async fn resolve(&self, user_id: &UserId) -> Result<Option<Profile>>;
}

/// DashMap-backed profile store
#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<DashMap<UserId, Profile>>,
}

impl InMemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile, returning the previous one
    pub fn insert(&self, profile: Profile) -> Option<Profile> {
        debug!(user_id = %profile.id, roles = ?profile.roles, "Profile stored");
        self.profiles.insert(profile.id.clone(), profile)
    }

    pub fn remove(&self, user_id: &UserId) -> Option<Profile> {
        self.profiles.remove(user_id).map(|(_, profile)| profile)
    }

    #[must_use]
    pub fn get(&self, user_id: &UserId) -> Option<Profile> {
        self.profiles.get(user_id).map(|p| p.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl FromIterator<Profile> for InMemoryProfileStore {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Self {
        let store = Self::new();
        for profile in iter {
            store.insert(profile);
        }
        store
    }
}

#[async_trait]
impl ProfileResolver for InMemoryProfileStore {
    async fn resolve(&self, user_id: &UserId) -> Result<Option<Profile>> {
        Ok(self.get(user_id))
    }
}
