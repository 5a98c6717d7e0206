//! The service module composes the caches and providers into the end-to-end textures
//! pipeline: username in, signed textures out.
//!
//! A lookup consults the uuids cache, falls through to the configured uuids provider,
//! then consults the textures cache and falls through to the textures provider. A call
//! performs at most one uuids provider invocation and one textures provider
//! invocation. Confirmed negatives are cached at both stages; errors never are.

use crate::cache::{Cache, Entry, UuidData};
use crate::emitter::{Emitter, Event};
use crate::error::DermaError;
use crate::mojang::{Profile, TexturesProvider, UsernameResolved, UuidsProvider};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Usernames are 1 to 25 word characters; anything else is rejected before any
/// upstream call.
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z0-9_]{1,25}$").unwrap());

/// The consumer interface of the textures pipeline; the sole operation the HTTP layer
/// calls. `Ok(None)` means the username has no identity or the identity has no
/// textures.
#[async_trait]
pub trait MojangTexturesProvider: Send + Sync {
    async fn get_for_username(&self, username: &str) -> Result<Option<Profile>, DermaError>;
}

/// The pipeline orchestrator.
pub struct Service {
    emitter: Arc<Emitter>,
    cache: Cache,
    uuids: Arc<dyn UuidsProvider>,
    textures: Arc<dyn TexturesProvider>,
}

impl Service {
    pub fn new(
        emitter: Arc<Emitter>,
        cache: Cache,
        uuids: Arc<dyn UuidsProvider>,
        textures: Arc<dyn TexturesProvider>,
    ) -> Self {
        Self {
            emitter,
            cache,
            uuids,
            textures,
        }
    }

    /// Resolves a lowercased username to its identity, preferring the cache. A
    /// confirmed negative is cached like a positive result, only shorter-lived.
    async fn resolve_uuid(&self, username: &str) -> Result<Option<UsernameResolved>, DermaError> {
        if let Some(entry) = self.cache.get_uuid(username).await {
            let resolved = entry.data.map(|data| UsernameResolved {
                id: data.uuid,
                name: data.username,
            });
            self.emitter.emit(Event::UsernamesAfterCache {
                username: username.to_string(),
                resolved: resolved.clone(),
                hit: true,
            });
            return Ok(resolved);
        }
        self.emitter.emit(Event::UsernamesAfterCache {
            username: username.to_string(),
            resolved: None,
            hit: false,
        });

        let resolved = self.uuids.get_uuid(username).await?;
        let entry = Entry::from(resolved.clone().map(|resolved| UuidData {
            username: resolved.name,
            uuid: resolved.id,
        }));
        self.cache.set_uuid(username.to_string(), entry).await;
        Ok(resolved)
    }

    /// Retrieves the signed textures for an identity, preferring the cache.
    async fn resolve_textures(&self, resolved: &UsernameResolved) -> Result<Option<Profile>, DermaError> {
        if let Some(entry) = self.cache.get_textures(&resolved.id).await {
            self.emitter.emit(Event::TexturesAfterCache {
                id: resolved.id,
                textures: entry.data.clone(),
                hit: true,
            });
            return Ok(entry.data);
        }
        self.emitter.emit(Event::TexturesAfterCache {
            id: resolved.id,
            textures: None,
            hit: false,
        });

        let textures = self.textures.get_textures(&resolved.id).await?;
        self.cache
            .set_textures(resolved.id, Entry::from(textures.clone()))
            .await;
        Ok(textures)
    }
}

#[async_trait]
impl MojangTexturesProvider for Service {
    #[tracing::instrument(skip(self))]
    async fn get_for_username(&self, username: &str) -> Result<Option<Profile>, DermaError> {
        self.emitter.emit(Event::Call {
            username: username.to_string(),
        });
        if !USERNAME_REGEX.is_match(username) {
            return Err(DermaError::InvalidUsername(username.to_string()));
        }
        let username = username.to_lowercase();

        let Some(resolved) = self.resolve_uuid(&username).await? else {
            return Ok(None);
        };
        self.resolve_textures(&resolved).await
    }
}

/// Replaces the pipeline when `mojang_textures.enabled = false`: every username
/// resolves to nothing.
pub struct NilProvider;

#[async_trait]
impl MojangTexturesProvider for NilProvider {
    async fn get_for_username(&self, _username: &str) -> Result<Option<Profile>, DermaError> {
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config;
    use crate::mojang::testing::NOTCH;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct StubUuids {
        results: Mutex<VecDeque<Result<Option<UsernameResolved>, DermaError>>>,
        calls: AtomicUsize,
    }

    impl StubUuids {
        fn returning(
            results: impl IntoIterator<Item = Result<Option<UsernameResolved>, DermaError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UuidsProvider for StubUuids {
        async fn get_uuid(&self, _: &str) -> Result<Option<UsernameResolved>, DermaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct StubTextures {
        results: Mutex<VecDeque<Result<Option<Profile>, DermaError>>>,
        calls: AtomicUsize,
    }

    impl StubTextures {
        fn returning(
            results: impl IntoIterator<Item = Result<Option<Profile>, DermaError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TexturesProvider for StubTextures {
        async fn get_textures(&self, _: &uuid::Uuid) -> Result<Option<Profile>, DermaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }
    }

    fn test_cache() -> Cache {
        Cache::new(config::CacheSettings {
            uuids: config::CacheEntry {
                cap: 100,
                exp: Duration::from_secs(2_592_000),
                exp_empty: Duration::from_secs(60),
            },
            textures: config::CacheEntry {
                cap: 100,
                exp: Duration::from_secs(60),
                exp_empty: Duration::from_secs(60),
            },
        })
    }

    fn service(uuids: Arc<StubUuids>, textures: Arc<StubTextures>) -> Service {
        Service::new(Arc::new(Emitter::new()), test_cache(), uuids, textures)
    }

    fn notch_resolved() -> UsernameResolved {
        UsernameResolved {
            id: NOTCH.id,
            name: "Notch".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_invalid_usernames_without_upstream_call() {
        // given
        let uuids = StubUuids::returning([]);
        let service = service(Arc::clone(&uuids), StubTextures::returning([]));

        // when / then
        for username in ["", "Ma-1_2", "26_characters_long_username", "käse"] {
            let result = service.get_for_username(username).await;
            assert!(matches!(result, Err(DermaError::InvalidUsername(_))));
        }
        assert_eq!(0, uuids.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn warms_both_caches_on_first_call() {
        // given
        let uuids = StubUuids::returning([Ok(Some(notch_resolved()))]);
        let textures = StubTextures::returning([Ok(Some(NOTCH.clone()))]);
        let service = service(Arc::clone(&uuids), Arc::clone(&textures));

        // when
        let first = service.get_for_username("Notch").await.unwrap();
        let second = service.get_for_username("notch").await.unwrap();

        // then: the second call is served entirely from the caches
        assert_eq!(Some(NOTCH.clone()), first);
        assert_eq!(first, second);
        assert_eq!(1, uuids.calls());
        assert_eq!(1, textures.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn caches_confirmed_negative_for_its_expiry() {
        // given
        let uuids = Arc::new(StubUuids::default());
        let textures = StubTextures::returning([]);
        let service = service(Arc::clone(&uuids), Arc::clone(&textures));

        // when: a confirmed negative is fresh
        assert_eq!(None, service.get_for_username("ghost").await.unwrap());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(None, service.get_for_username("ghost").await.unwrap());

        // then: only the first call went upstream, and no textures were requested
        assert_eq!(1, uuids.calls());
        assert_eq!(0, textures.calls());

        // when: the negative expires
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(None, service.get_for_username("ghost").await.unwrap());

        // then
        assert_eq!(2, uuids.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_cache_provider_errors() {
        // given
        let uuids = StubUuids::returning([
            Err(DermaError::RateLimited),
            Ok(Some(notch_resolved())),
        ]);
        let textures = StubTextures::returning([Ok(Some(NOTCH.clone()))]);
        let service = service(Arc::clone(&uuids), Arc::clone(&textures));

        // when
        let failed = service.get_for_username("Notch").await;
        let retried = service.get_for_username("Notch").await.unwrap();

        // then: the error was surfaced and the retry went upstream again
        assert_eq!(Err(DermaError::RateLimited), failed);
        assert_eq!(Some(NOTCH.clone()), retried);
        assert_eq!(2, uuids.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn textures_expiry_is_independent_of_uuid_expiry() {
        // given
        let uuids = StubUuids::returning([Ok(Some(notch_resolved()))]);
        let textures =
            StubTextures::returning([Ok(Some(NOTCH.clone())), Ok(Some(NOTCH.clone()))]);
        let service = service(Arc::clone(&uuids), Arc::clone(&textures));
        service.get_for_username("Notch").await.unwrap();

        // when: the textures entry expires while the uuid entry stays fresh
        tokio::time::advance(Duration::from_secs(61)).await;
        let result = service.get_for_username("Notch").await.unwrap();

        // then
        assert_eq!(Some(NOTCH.clone()), result);
        assert_eq!(1, uuids.calls());
        assert_eq!(2, textures.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn caches_identity_without_textures_as_negative() {
        // given
        let uuids = StubUuids::returning([Ok(Some(notch_resolved()))]);
        let textures = StubTextures::returning([Ok(None)]);
        let service = service(Arc::clone(&uuids), Arc::clone(&textures));

        // when
        let first = service.get_for_username("Notch").await.unwrap();
        let second = service.get_for_username("Notch").await.unwrap();

        // then: the missing textures are cached as a negative
        assert_eq!(None, first);
        assert_eq!(None, second);
        assert_eq!(1, textures.calls());
    }

    #[tokio::test]
    async fn nil_provider_resolves_everything_to_none() {
        // given / when / then
        assert_eq!(None, NilProvider.get_for_username("Notch").await.unwrap());
    }
}
