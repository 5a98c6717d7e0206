//! The cache module provides the two split stores of the textures pipeline: one for
//! username to uuid resolve results and one for uuid to signed textures results.
//!
//! The split is deliberate. Identities move rarely, so a resolved username may be
//! memoised for a long time, while the signed textures blob behind an identity
//! changes often and only stays valid for minutes. Both stores also record
//! *negative* entries (upstream confirmed absence) with their own, short expiry so
//! that repeat lookups do not burn the upstream rate limit.

pub mod entry;

use crate::config;
use crate::mojang::Profile;
pub use entry::Entry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A [UuidData] is a resolved username (case-sensitive, canonical casing from upstream).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UuidData {
    pub username: String,
    pub uuid: Uuid,
}

/// The split in-memory cache of the textures pipeline.
///
/// Entries are stored in [moka] caches whose capacity and time-to-live merely bound
/// memory; the pipeline-visible expiry is decided per entry on read via
/// [Entry::is_expired], so a negative entry turns absent long before moka evicts
/// it. Expired entries are invalidated lazily when a read encounters them.
#[derive(Debug)]
pub struct Cache {
    settings: config::CacheSettings,
    uuids: moka::future::Cache<String, Entry<UuidData>>,
    textures: moka::future::Cache<Uuid, Entry<Profile>>,
}

impl Cache {
    pub fn new(settings: config::CacheSettings) -> Self {
        Self {
            uuids: moka::future::Cache::builder()
                .max_capacity(settings.uuids.cap)
                .time_to_live(settings.uuids.exp)
                .build(),
            textures: moka::future::Cache::builder()
                .max_capacity(settings.textures.cap)
                .time_to_live(settings.textures.exp)
                .build(),
            settings,
        }
    }

    /// Gets a fresh resolve result for a lowercased username. Expired entries are
    /// treated as absent and evicted.
    #[tracing::instrument(skip(self))]
    pub async fn get_uuid(&self, username: &str) -> Option<Entry<UuidData>> {
        let entry = self.uuids.get(username).await?;
        if entry.is_expired(&self.settings.uuids) {
            self.uuids.invalidate(username).await;
            return None;
        }
        Some(entry)
    }

    /// Stores a resolve result for a lowercased username, replacing any previous entry.
    #[tracing::instrument(skip(self, entry))]
    pub async fn set_uuid(&self, username: String, entry: Entry<UuidData>) {
        self.uuids.insert(username, entry).await;
    }

    /// Gets fresh signed textures for a profile id. Expired entries are treated as
    /// absent and evicted.
    #[tracing::instrument(skip(self))]
    pub async fn get_textures(&self, uuid: &Uuid) -> Option<Entry<Profile>> {
        let entry = self.textures.get(uuid).await?;
        if entry.is_expired(&self.settings.textures) {
            self.textures.invalidate(uuid).await;
            return None;
        }
        Some(entry)
    }

    /// Stores signed textures for a profile id, replacing any previous entry.
    #[tracing::instrument(skip(self, entry))]
    pub async fn set_textures(&self, uuid: Uuid, entry: Entry<Profile>) {
        self.textures.insert(uuid, entry).await;
    }

    /// Drops the resolve result for a username, e.g. after an administrative
    /// mutation of the local record store.
    pub async fn invalidate_uuid(&self, username: &str) {
        self.uuids.invalidate(username).await;
    }

    /// Drops the signed textures for a profile id.
    pub async fn invalidate_textures(&self, uuid: &Uuid) {
        self.textures.invalidate(uuid).await;
    }
}
