//! The common module provides shared utilities for the integration tests, most notably
//! a counting wrapper around the static testing api and a builder assembling the full
//! textures pipeline the way the composition root does.

use async_trait::async_trait;
use derma::cache::Cache;
use derma::config;
use derma::emitter::Emitter;
use derma::error::DermaError;
use derma::mojang::batch::BatchUuidsProvider;
use derma::mojang::testing::MojangTestingApi;
use derma::mojang::textures::SignedTexturesProvider;
use derma::mojang::{Mojang, Profile, TexturesProvider, UsernameResolved, UuidsProvider};
use derma::service::Service;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Wraps a [MojangTestingApi], counting upstream calls and optionally failing the
/// uuids endpoint with a rate limit.
#[derive(Default)]
pub struct CountingMojang {
    inner: MojangTestingApi,
    pub uuid_calls: AtomicUsize,
    pub uuid_batches: std::sync::Mutex<Vec<Vec<String>>>,
    pub profile_calls: AtomicUsize,
    pub rate_limited: AtomicBool,
}

#[allow(dead_code)]
impl CountingMojang {
    pub fn new(inner: MojangTestingApi) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn uuid_calls(&self) -> usize {
        self.uuid_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn set_rate_limited(&self, limited: bool) {
        self.rate_limited.store(limited, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mojang for CountingMojang {
    async fn fetch_uuids(
        &self,
        usernames: &[String],
    ) -> Result<Vec<UsernameResolved>, DermaError> {
        self.uuid_calls.fetch_add(1, Ordering::SeqCst);
        self.uuid_batches.lock().unwrap().push(usernames.to_vec());
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(DermaError::RateLimited);
        }
        self.inner.fetch_uuids(usernames).await
    }

    async fn fetch_profile(&self, uuid: &Uuid) -> Result<Option<Profile>, DermaError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limited.load(Ordering::SeqCst) {
            return Err(DermaError::RateLimited);
        }
        self.inner.fetch_profile(uuid).await
    }
}

/// The assembled pipeline under test.
pub struct TestPipeline {
    pub service: Arc<Service>,
    pub api: Arc<CountingMojang>,
    pub emitter: Arc<Emitter>,
}

/// Builds the full pipeline (batch provider, both caches, emitter) around the default
/// testing profiles.
#[allow(dead_code)]
pub fn pipeline() -> TestPipeline {
    pipeline_with(MojangTestingApi::with_profiles())
}

/// Builds the full pipeline around a custom [MojangTestingApi].
pub fn pipeline_with(inner: MojangTestingApi) -> TestPipeline {
    let emitter = Arc::new(Emitter::new());
    let api = Arc::new(CountingMojang::new(inner));
    let cache = Cache::new(config::CacheSettings {
        uuids: config::CacheEntry {
            cap: 1_000,
            exp: Duration::from_secs(2_592_000),
            exp_empty: Duration::from_secs(60),
        },
        textures: config::CacheEntry {
            cap: 1_000,
            exp: Duration::from_secs(60),
            exp_empty: Duration::from_secs(60),
        },
    });
    let uuids: Arc<dyn UuidsProvider> = Arc::new(BatchUuidsProvider::new(
        Arc::clone(&api) as Arc<dyn Mojang>,
        Arc::clone(&emitter),
        Duration::from_millis(2500),
        10,
    ));
    let textures: Arc<dyn TexturesProvider> = Arc::new(SignedTexturesProvider::new(
        Arc::clone(&api) as Arc<dyn Mojang>,
        Arc::clone(&emitter),
    ));
    let service = Arc::new(Service::new(
        Arc::clone(&emitter),
        cache,
        uuids,
        textures,
    ));
    TestPipeline {
        service,
        api,
        emitter,
    }
}
