//! Derma is a Minecraft skin system that serves skin and cape texture metadata for
//! player usernames. Lookups prefer the locally administered record store; everything
//! else is resolved through a cache-fronted, coalescing, batched Mojang textures
//! pipeline that is careful with the upstream rate limits.
//!
//! # Usage
//!
//! Start the application by first initializing [tracing] and then calling [start] with
//! the [application configuration](config).
//!
//! # Configuration
//!
//! See [config] for a description on how to create the application configuration.

use crate::cache::Cache;
use crate::config::{Config, UuidsProviderDriver};
use crate::emitter::Emitter;
use crate::health::{HealthChecker, QueueLengthProbe, ResponseProbe};
use crate::mojang::api::MojangApi;
use crate::mojang::batch::BatchUuidsProvider;
use crate::mojang::remote::RemoteUuidsProvider;
use crate::mojang::textures::SignedTexturesProvider;
use crate::mojang::{Mojang, TexturesProvider, UuidsProvider};
use crate::record::{InMemorySkinsRepository, SkinsRepository};
use crate::rest_services::AppState;
use crate::service::{MojangTexturesProvider, NilProvider, Service};
use axum::routing::get;
use axum::{Extension, Router};
use futures_util::FutureExt;
use std::sync::Arc;
use tracing::info;

pub mod cache;
pub mod config;
pub mod emitter;
pub mod error;
pub mod health;
mod metrics;
pub mod mojang;
pub mod record;
mod rest_services;
pub mod service;

/// Starts derma with the provided [application configuration](config). It expects that
/// [tracing] has been configured beforehand. It blocks until a shutdown signal is
/// received (graceful shutdown).
#[tracing::instrument(skip(config))]
pub async fn start(config: Arc<Config>) -> Result<(), Box<dyn std::error::Error>> {
    info!("starting derma …");

    // the emitter connects the pipeline to probes, metrics and logging
    let emitter = Arc::new(Emitter::new());
    if config.metrics.enabled {
        metrics::register_listener(&emitter);
    }
    let response_probe = ResponseProbe::register(&emitter, config.healthcheck.cool_down);
    let queue_probe = QueueLengthProbe::register(&emitter, config.healthcheck.queue_length_limit);
    let checkers: Vec<Arc<dyn HealthChecker>> = vec![response_probe, queue_probe];

    // build the textures pipeline from caches, providers and the emitter
    let textures: Arc<dyn MojangTexturesProvider> = if config.mojang_textures.enabled {
        info!("building mojang textures pipeline");
        let cache = Cache::new(config.cache.clone());
        let api: Arc<dyn Mojang> = Arc::new(MojangApi::new());
        let uuids: Arc<dyn UuidsProvider> = match config.mojang_textures.uuids_provider.driver {
            UuidsProviderDriver::Batch => {
                info!(
                    delay = ?config.queue.loop_delay,
                    batch_size = config.queue.batch_size,
                    "using batch uuids provider"
                );
                Arc::new(BatchUuidsProvider::new(
                    Arc::clone(&api),
                    Arc::clone(&emitter),
                    config.queue.loop_delay,
                    config.queue.batch_size,
                ))
            }
            UuidsProviderDriver::Remote => {
                info!(
                    url = config.mojang_textures.uuids_provider.url,
                    "using remote uuids provider"
                );
                Arc::new(RemoteUuidsProvider::new(
                    config.mojang_textures.uuids_provider.url.clone(),
                    Arc::clone(&emitter),
                ))
            }
        };
        let textures_provider: Arc<dyn TexturesProvider> =
            Arc::new(SignedTexturesProvider::new(api, Arc::clone(&emitter)));
        Arc::new(Service::new(emitter, cache, uuids, textures_provider))
    } else {
        info!("mojang textures pipeline is disabled");
        Arc::new(NilProvider)
    };

    let skins: Arc<dyn SkinsRepository> = Arc::new(InMemorySkinsRepository::new());
    let state = Arc::new(AppState {
        textures,
        skins,
        checkers,
        extra_param: (
            config.textures.extra_param_name.clone(),
            config.textures.extra_param_value.clone(),
        ),
    });

    serve_rest_server(config, state).await?;
    info!("derma stopped successfully");
    Ok(())
}

/// Starts the rest server. Blocks until shutdown (graceful shutdown).
#[tracing::instrument(skip_all)]
async fn serve_rest_server(
    config: Arc<Config>,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = config.rest_server.address;

    let mut app = Router::new()
        .route("/skins/{username}", get(rest_services::skin))
        .route("/cloaks/{username}", get(rest_services::cape))
        .route("/textures/{username}", get(rest_services::textures))
        .route(
            "/textures/signed/{username}",
            get(rest_services::signed_textures),
        )
        .route("/healthcheck", get(rest_services::healthcheck));
    if config.metrics.enabled {
        app = app.route("/metrics", get(rest_services::metrics));
    }
    let app = app.layer(Extension(state));

    // register the shutdown signal (as future)
    let shutdown = tokio::signal::ctrl_c().map(|_| ());

    info!(
        address = address.to_string(),
        metrics = config.metrics.enabled,
        "rest server listening on {}",
        address
    );
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("rest server stopped successfully");
    Ok(())
}
