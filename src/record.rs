//! The record module defines the locally administered skin record store. The store is
//! populated by an administrator and consulted by the HTTP layer before the Mojang
//! pipeline; the pipeline itself never touches it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// A locally administered skin record for one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkinRecord {
    /// The local account identifier.
    pub user_id: u64,
    pub username: String,
    /// The account uuid, hyphenated or simple.
    pub uuid: String,
    /// The identifier of the assigned skin; `0` means no skin is assigned.
    pub skin_id: u64,
    /// The URL the assigned skin is served from.
    pub url: String,
    pub is_1_8: bool,
    pub is_slim: bool,
    /// A stored signed textures payload, if the administrator captured one.
    pub mojang_textures: Option<String>,
    pub mojang_signature: Option<String>,
}

impl SkinRecord {
    /// Whether the record actually assigns a skin.
    pub fn has_skin(&self) -> bool {
        self.skin_id != 0
    }
}

/// The read interface of the record store, keyed case-insensitively by username.
#[async_trait]
pub trait SkinsRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Option<SkinRecord>;
    async fn find_by_user_id(&self, user_id: u64) -> Option<SkinRecord>;
}

/// An in-memory [SkinsRepository], used by tests and standalone deployments.
/// Persistent backends implement the same trait and are wired at composition.
#[derive(Debug, Default)]
pub struct InMemorySkinsRepository {
    records: RwLock<HashMap<String, SkinRecord>>,
}

impl InMemorySkinsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SkinRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.username.to_lowercase(), record);
    }
}

#[async_trait]
impl SkinsRepository for InMemorySkinsRepository {
    async fn find_by_username(&self, username: &str) -> Option<SkinRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&username.to_lowercase())
            .cloned()
    }

    async fn find_by_user_id(&self, user_id: u64) -> Option<SkinRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|record| record.user_id == user_id)
            .cloned()
    }
}
