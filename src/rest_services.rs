//! The rest module provides the [axum] handlers of the skin system. The handlers are a
//! thin adapter: they consult the local record store first and delegate everything else
//! to the textures pipeline, translating its results into redirects and JSON.

use crate::error::DermaError;
use crate::health::HealthChecker;
use crate::metrics::REGISTRY;
use crate::mojang::{Profile, ProfileProperty, Texture, TextureMetadata, Textures};
use crate::record::{SkinRecord, SkinsRepository};
use crate::service::MojangTexturesProvider;
use axum::extract::{Path, Query};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use prometheus_client::encoding::text::encode;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// The shared state of the rest handlers, assembled at composition.
pub struct AppState {
    pub textures: Arc<dyn MojangTexturesProvider>,
    pub skins: Arc<dyn SkinsRepository>,
    pub checkers: Vec<Arc<dyn HealthChecker>>,
    /// The extra property appended to every signed textures response.
    pub extra_param: (String, String),
}

/// Strips a trailing `.png` before the username enters the pipeline.
fn parse_username(username: &str) -> &str {
    username.strip_suffix(".png").unwrap_or(username)
}

/// A `301 Moved Permanently` redirect, as served for skin and cape URLs.
fn moved_permanently(url: &str) -> Response {
    match header::HeaderValue::from_str(url) {
        Ok(location) => (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, location)],
        )
            .into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Resolves the decoded textures of a username through the pipeline, logging errors.
async fn pipeline_textures(state: &AppState, username: &str) -> Option<Textures> {
    let profile = match state.textures.get_for_username(username).await {
        Ok(Some(profile)) => profile,
        Ok(None) | Err(DermaError::InvalidUsername(_)) => return None,
        Err(err) => {
            warn!(username, %err, "textures pipeline failed");
            return None;
        }
    };
    match profile.get_textures() {
        Ok(prop) => Some(prop.textures),
        Err(err) => {
            warn!(username, %err, "profile carried undecodable textures");
            None
        }
    }
}

/// An [axum] handler redirecting to the skin of a username.
pub async fn skin(
    Extension(state): Extension<Arc<AppState>>,
    Path(username): Path<String>,
) -> Response {
    let username = parse_username(&username);
    let record = state.skins.find_by_username(username).await;
    if let Some(record) = record.filter(SkinRecord::has_skin) {
        return moved_permanently(&record.url);
    }

    match pipeline_textures(&state, username).await.and_then(|textures| textures.skin) {
        Some(skin) => moved_permanently(&skin.url),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// An [axum] handler redirecting to the cape of a username.
pub async fn cape(
    Extension(state): Extension<Arc<AppState>>,
    Path(username): Path<String>,
) -> Response {
    let username = parse_username(&username);
    match pipeline_textures(&state, username).await.and_then(|textures| textures.cape) {
        Some(cape) => moved_permanently(&cape.url),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// An [axum] handler serving the merged texture URLs document of a username. Locally
/// administered records win over the pipeline.
pub async fn textures(
    Extension(state): Extension<Arc<AppState>>,
    Path(username): Path<String>,
) -> Response {
    let username = parse_username(&username);
    let record = state.skins.find_by_username(username).await;
    if let Some(record) = record.filter(SkinRecord::has_skin) {
        let textures = Textures {
            skin: Some(Texture {
                url: record.url.clone(),
                metadata: record.is_slim.then(|| TextureMetadata {
                    model: "slim".to_string(),
                }),
            }),
            cape: None,
        };
        return Json(textures).into_response();
    }

    match pipeline_textures(&state, username).await {
        Some(textures) => Json(textures).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Builds a signed textures document from a locally administered record, if it carries
/// a captured payload.
fn record_signed_textures(record: &SkinRecord) -> Option<Profile> {
    let value = record.mojang_textures.clone()?;
    let id = Uuid::parse_str(&record.uuid).ok()?;
    Some(Profile {
        id,
        name: record.username.clone(),
        properties: vec![ProfileProperty {
            name: "textures".to_string(),
            value,
            signature: record.mojang_signature.clone(),
        }],
    })
}

/// An [axum] handler serving the signed textures document of a username. The pipeline
/// is only consulted when the caller opts in with the `proxy` query parameter.
pub async fn signed_textures(
    Extension(state): Extension<Arc<AppState>>,
    Path(username): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let username = parse_username(&username);

    let mut profile = match state.skins.find_by_username(username).await {
        Some(record) if record.has_skin() => record_signed_textures(&record),
        _ => None,
    };
    if profile.is_none() && query.get("proxy").is_some_and(|proxy| !proxy.is_empty()) {
        profile = state
            .textures
            .get_for_username(username)
            .await
            .ok()
            .flatten();
    }

    let Some(mut profile) = profile else {
        return StatusCode::NO_CONTENT.into_response();
    };
    profile.properties.push(ProfileProperty {
        name: state.extra_param.0.clone(),
        value: state.extra_param.1.clone(),
        signature: None,
    });
    Json(profile).into_response()
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    checks: Vec<CheckReport>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    name: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// An [axum] handler aggregating the health probes. Responds 503 while any probe fails.
pub async fn healthcheck(Extension(state): Extension<Arc<AppState>>) -> Response {
    let checks: Vec<CheckReport> = state
        .checkers
        .iter()
        .map(|checker| match checker.check() {
            Ok(()) => CheckReport {
                name: checker.name(),
                status: "OK",
                message: None,
            },
            Err(message) => CheckReport {
                name: checker.name(),
                status: "FAIL",
                message: Some(message),
            },
        })
        .collect();

    let healthy = checks.iter().all(|check| check.status == "OK");
    let report = HealthReport {
        status: if healthy { "OK" } else { "FAIL" },
        checks,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// An [axum] handler providing [prometheus_client] metrics.
pub async fn metrics() -> Response {
    let mut buf = String::new();
    if let Err(err) = encode(&mut buf, &REGISTRY) {
        warn!(%err, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Response::builder()
        .header(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )
        .body(buf.into())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
