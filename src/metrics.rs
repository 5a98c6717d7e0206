//! The metrics module aggregates [prometheus_client] metrics from pipeline events.
//! The registry is exposed by the rest server at `/metrics`.

use crate::emitter::{Emitter, Event};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::{Arc, LazyLock};

/// The application metrics registry.
pub(crate) static REGISTRY: LazyLock<Arc<Registry>> = LazyLock::new(build_registry);

/// A counter for the number of textures pipeline calls.
pub(crate) static PIPELINE_CALLS: LazyLock<Counter> = LazyLock::new(Counter::default);

/// A counter for pipeline cache results, by cache and outcome.
pub(crate) static CACHE_RESULTS: LazyLock<Family<CacheResultLabels, Counter>> =
    LazyLock::new(Family::<CacheResultLabels, Counter>::default);

/// A counter for upstream mojang calls, by request type and outcome.
pub(crate) static MOJANG_CALLS: LazyLock<Family<MojangCallLabels, Counter>> =
    LazyLock::new(Family::<MojangCallLabels, Counter>::default);

/// A gauge for the batch provider queue length, observed per dispatch round.
pub(crate) static QUEUE_SIZE: LazyLock<Gauge> = LazyLock::new(Gauge::default);

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheResultLabels {
    pub cache: &'static str,
    pub result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MojangCallLabels {
    pub request_type: &'static str,
    pub status: &'static str,
}

fn build_registry() -> Arc<Registry> {
    let mut registry = Registry::with_prefix("derma");

    registry.register(
        "mojang_textures_calls",
        "The total number of textures pipeline calls.",
        PIPELINE_CALLS.clone(),
    );

    registry.register(
        "cache_results",
        "The pipeline cache results by cache and outcome.",
        CACHE_RESULTS.clone(),
    );

    registry.register(
        "mojang_requests",
        "The upstream mojang calls by request type and outcome.",
        MOJANG_CALLS.clone(),
    );

    registry.register(
        "batch_queue_size",
        "The batch uuids provider queue length at the last dispatch round.",
        QUEUE_SIZE.clone(),
    );

    Arc::new(registry)
}

fn cache_result(hit: bool) -> &'static str {
    if hit { "hit" } else { "miss" }
}

fn call_status(error: bool) -> &'static str {
    if error { "error" } else { "ok" }
}

/// Subscribes the metrics aggregation to the pipeline events.
pub(crate) fn register_listener(emitter: &Emitter) {
    emitter.subscribe(|event| match event {
        Event::Call { .. } => {
            PIPELINE_CALLS.inc();
        }
        Event::UsernamesAfterCache { hit, .. } => {
            CACHE_RESULTS
                .get_or_create(&CacheResultLabels {
                    cache: "uuids",
                    result: cache_result(*hit),
                })
                .inc();
        }
        Event::TexturesAfterCache { hit, .. } => {
            CACHE_RESULTS
                .get_or_create(&CacheResultLabels {
                    cache: "textures",
                    result: cache_result(*hit),
                })
                .inc();
        }
        Event::UsernamesAfterCall { error, .. } => {
            MOJANG_CALLS
                .get_or_create(&MojangCallLabels {
                    request_type: "uuids",
                    status: call_status(error.is_some()),
                })
                .inc();
        }
        Event::TexturesAfterCall { error, .. } => {
            MOJANG_CALLS
                .get_or_create(&MojangCallLabels {
                    request_type: "textures",
                    status: call_status(error.is_some()),
                })
                .inc();
        }
        Event::QueueSize { size } => {
            QUEUE_SIZE.set(*size as i64);
        }
        _ => {}
    });
}
