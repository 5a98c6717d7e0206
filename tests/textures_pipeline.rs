//! End-to-end scenarios for the textures pipeline: caches, batch provider and service
//! assembled the way the composition root wires them, against the static testing api.

mod common;

use crate::common::{pipeline, pipeline_with};
use derma::error::DermaError;
use derma::health::{HealthChecker, ResponseProbe};
use derma::mojang::testing::{MojangTestingApi, NOTCH, testing_profile};
use derma::service::MojangTexturesProvider;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test(start_paused = true)]
async fn warms_caches_and_serves_repeat_lookups_locally() {
    // given
    let pipeline = pipeline();

    // when
    let first = pipeline.service.get_for_username("Notch").await.unwrap();
    let second = pipeline.service.get_for_username("NOTCH").await.unwrap();

    // then: one upstream round trip per stage, both results identical
    assert_eq!(Some(NOTCH.clone()), first);
    assert_eq!(first, second);
    assert_eq!(1, pipeline.api.uuid_calls());
    assert_eq!(1, pipeline.api.profile_calls());
}

#[tokio::test(start_paused = true)]
async fn coalesces_twenty_concurrent_callers_into_one_round() {
    // given
    let pipeline = pipeline();

    // when
    let handles: Vec<_> = (0..20)
        .map(|_| {
            let service = Arc::clone(&pipeline.service);
            tokio::spawn(async move { service.get_for_username("jeb_").await })
        })
        .collect();

    // then: all callers observe the identical signed textures
    for handle in handles {
        let textures = handle.await.unwrap().unwrap();
        assert!(textures.is_some_and(|profile| profile.name == "jeb_"));
    }
    assert_eq!(1, pipeline.api.uuid_calls());
    assert_eq!(
        vec![vec!["jeb_".to_string()]],
        pipeline.api.uuid_batches.lock().unwrap().clone()
    );
    assert_eq!(1, pipeline.api.profile_calls());
}

#[tokio::test(start_paused = true)]
async fn groups_a_mixed_burst_into_one_upstream_call() {
    // given: four profiles beyond the defaults
    let mut api = MojangTestingApi::new();
    let names = ["Alpha", "Bravo", "Charlie", "Delta"];
    for name in names {
        let profile = testing_profile(
            Uuid::new_v4(),
            name,
            &format!("http://textures.minecraft.net/texture/{name}"),
            None,
        );
        api = api.add_profile(&profile);
    }
    let pipeline = pipeline_with(api);

    // when: the burst arrives within the same dispatch round
    let handles: Vec<_> = names
        .into_iter()
        .map(|name| {
            let service = Arc::clone(&pipeline.service);
            tokio::spawn(async move { service.get_for_username(name).await })
        })
        .collect();
    for (handle, name) in handles.into_iter().zip(names) {
        let textures = handle.await.unwrap().unwrap();
        assert!(textures.is_some_and(|profile| profile.name == name));
    }

    // then: one uuids call carried all four names; textures were fetched per identity
    let batches = pipeline.api.uuid_batches.lock().unwrap().clone();
    assert_eq!(1, batches.len());
    let mut batch = batches[0].clone();
    batch.sort();
    assert_eq!(vec!["alpha", "bravo", "charlie", "delta"], batch);
    assert_eq!(4, pipeline.api.profile_calls());
}

#[tokio::test(start_paused = true)]
async fn confirmed_negative_is_served_from_cache() {
    // given
    let pipeline = pipeline();

    // when
    let first = pipeline.service.get_for_username("ghost").await.unwrap();
    let second = pipeline.service.get_for_username("ghost").await.unwrap();

    // then: the second lookup does not go upstream at all
    assert_eq!(None, first);
    assert_eq!(None, second);
    assert_eq!(1, pipeline.api.uuid_calls());
    assert_eq!(0, pipeline.api.profile_calls());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_fails_the_round_and_trips_the_response_probe() {
    // given
    let pipeline = pipeline();
    let probe = ResponseProbe::register(&pipeline.emitter, Duration::from_secs(60));
    pipeline.api.set_rate_limited(true);

    // when
    let failed = pipeline.service.get_for_username("Notch").await;

    // then: the error surfaced unchanged and nothing was cached
    assert_eq!(Err(DermaError::RateLimited), failed);
    assert!(probe.check().is_err());

    // when: the upstream recovers, the retry goes upstream again
    pipeline.api.set_rate_limited(false);
    let retried = pipeline.service.get_for_username("Notch").await.unwrap();

    // then
    assert_eq!(Some(NOTCH.clone()), retried);
    assert_eq!(2, pipeline.api.uuid_calls());

    // and the probe heals once the cool-down window elapses
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(probe.check().is_ok());
}
