//! Provider seams the engine consumes: profiles, wear history, and the
//! clock. Hosts implement these against their own storage; the static
//! implementations here serve tests and embedded hosts.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::profile::Profile;

/// Snapshot source for user profiles.
#[async_trait]
pub trait ProfileProvider: Send + Sync + fmt::Debug {
    /// The profile snapshot for a user, or `None` when unknown.
    async fn snapshot(&self, user_id: &str) -> Option<Profile>;
}

/// Source of recently worn item ids, most recent first.
#[async_trait]
pub trait WearHistoryProvider: Send + Sync + fmt::Debug {
    async fn recent(&self, user_id: &str, n: usize) -> Vec<String>;
}

/// Time source, injectable for deterministic tests.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// In-memory profile store.
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: RwLock<BTreeMap<String, Profile>>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: Profile) {
        self.profiles
            .write()
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileProvider for StaticProfiles {
    async fn snapshot(&self, user_id: &str) -> Option<Profile> {
        self.profiles.read().get(user_id).cloned()
    }
}

/// In-memory wear history, most recent first.
#[derive(Debug, Default)]
pub struct StaticWearHistory {
    worn: RwLock<BTreeMap<String, Vec<String>>>,
}

impl StaticWearHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outfit's items as the most recent wear.
    pub fn record(&self, user_id: &str, item_ids: impl IntoIterator<Item = String>) {
        let mut worn = self.worn.write();
        let entry = worn.entry(user_id.to_string()).or_default();
        let mut fresh: Vec<String> = item_ids.into_iter().collect();
        fresh.extend(entry.drain(..));
        *entry = fresh;
    }
}

#[async_trait]
impl WearHistoryProvider for StaticWearHistory {
    async fn recent(&self, user_id: &str, n: usize) -> Vec<String> {
        self.worn
            .read()
            .get(user_id)
            .map(|ids| ids.iter().take(n).cloned().collect())
            .unwrap_or_default()
    }
}
