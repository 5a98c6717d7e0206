//! The mojang module defines the upstream wire model of the textures pipeline and the
//! provider traits composed by the [service](crate::service). The two-stage pipeline is
//! visible in the traits: a [UuidsProvider] turns a username into an identity, a
//! [TexturesProvider] turns an identity into signed textures.

pub mod api;
pub mod batch;
pub mod remote;
pub mod testing;
pub mod textures;

use crate::error::DermaError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a single Minecraft user profile carrying its signed properties.
///
/// The `properties` usually only include one property called `textures`, but this may
/// change over time, so it is kept as an array as that is what's specified in the JSON.
/// Profile ids serialize in the simple (dash-less) format used by the mojang api.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// The unique identifier of the Minecraft user profile.
    #[serde(with = "uuid::serde::simple")]
    pub id: Uuid,
    /// The current visual name of the Minecraft user profile.
    pub name: String,
    /// The currently assigned properties of the Minecraft user profile.
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

/// Represents a single property of a Minecraft user profile.
///
/// The most prominent property is called `textures` and carries a base64 encoded
/// [TexturesProperty]. The `signature`, when present, is a detached signature over the
/// base64 value, signed with Yggdrasil's private key. It is only provided if
/// `?unsigned=false` is appended to the profile request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileProperty {
    /// The unique, identifiable name of the profile property.
    pub name: String,
    /// The base64 encoded value of the profile property.
    pub value: String,
    /// The base64 encoded signature of the profile property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Profile {
    /// Decodes the `textures` property of the [Profile].
    pub fn get_textures(&self) -> Result<TexturesProperty, DermaError> {
        let prop = self
            .properties
            .iter()
            .find(|prop| prop.name == "textures")
            .ok_or_else(|| DermaError::InvalidTextures("missing textures property".to_string()))?;
        decode_texture_prop(&prop.value)
    }
}

/// The payload of the `textures` profile property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TexturesProperty {
    pub timestamp: u64,
    #[serde(with = "uuid::serde::simple")]
    pub profile_id: Uuid,
    pub profile_name: String,
    pub textures: Textures,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub struct Textures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<Texture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cape: Option<Texture>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TextureMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextureMetadata {
    pub model: String,
}

/// A username resolved to its identity. Absence of an identity is represented as
/// `Option::<UsernameResolved>::None` throughout the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsernameResolved {
    #[serde(with = "uuid::serde::simple")]
    pub id: Uuid,
    pub name: String,
}

/// Decodes a base64 encoded [TexturesProperty].
pub fn decode_texture_prop(value: &str) -> Result<TexturesProperty, DermaError> {
    let bytes = BASE64
        .decode(value)
        .map_err(|err| DermaError::InvalidTextures(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| DermaError::InvalidTextures(err.to_string()))
}

/// Encodes a [TexturesProperty] into the base64 form carried by a profile property.
pub fn encode_texture_prop(prop: &TexturesProperty) -> Result<String, DermaError> {
    let json =
        serde_json::to_vec(prop).map_err(|err| DermaError::InvalidTextures(err.to_string()))?;
    Ok(BASE64.encode(json))
}

/// The upstream mojang api as consumed by the providers: a bulk username endpoint and a
/// session profile endpoint.
#[async_trait]
pub trait Mojang: Send + Sync {
    /// Resolves a batch of usernames. Usernames without an identity are omitted from
    /// the response; canonical casing in the response wins.
    async fn fetch_uuids(&self, usernames: &[String])
    -> Result<Vec<UsernameResolved>, DermaError>;

    /// Fetches the signed profile for an id. `Ok(None)` means the profile does not exist.
    async fn fetch_profile(&self, uuid: &Uuid) -> Result<Option<Profile>, DermaError>;
}

/// Resolves a single username to its identity, by whatever strategy the configured
/// driver implements. Thread-safe; called concurrently from many request tasks.
#[async_trait]
pub trait UuidsProvider: Send + Sync {
    async fn get_uuid(&self, username: &str) -> Result<Option<UsernameResolved>, DermaError>;
}

/// Retrieves the signed textures for an identity.
#[async_trait]
pub trait TexturesProvider: Send + Sync {
    async fn get_textures(&self, uuid: &Uuid) -> Result<Option<Profile>, DermaError>;
}
