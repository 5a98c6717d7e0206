use crate::error::DermaError;
use crate::mojang::{Mojang, Profile, UsernameResolved};
use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

/// The mojang bulk endpoint resolves at most ten usernames per request.
const UUIDS_CHUNK_SIZE: usize = 10;

const UUIDS_URL: &str = "https://api.minecraftservices.com/minecraft/profile/lookup/bulk/byname";
const PROFILES_URL: &str = "https://sessionserver.mojang.com/session/minecraft/profile";

/// [MojangApi] is a stateless wrapper for the official mojang api.
///
/// It maps the upstream status contract onto the pipeline error model: 429 becomes
/// [DermaError::RateLimited], a missing profile becomes `Ok(None)`, and any status the
/// contract does not cover is surfaced unchanged as [DermaError::UnexpectedStatus].
/// No retries happen at this layer.
#[derive(Debug)]
pub struct MojangApi {
    client: reqwest::Client,
}

impl Default for MojangApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MojangApi {
    /// Creates a new [MojangApi] with a shared connection pool.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Implements [Mojang::fetch_uuids] but with the constraint that the usernames slice
    /// may not be larger than the mojang api allows.
    #[tracing::instrument(skip(self))]
    async fn fetch_uuids_chunk(
        &self,
        usernames: &[String],
    ) -> Result<Vec<UsernameResolved>, DermaError> {
        let response = self.client.post(UUIDS_URL).json(usernames).send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(vec![]),
            StatusCode::TOO_MANY_REQUESTS => Err(DermaError::RateLimited),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(DermaError::UnexpectedStatus(status.as_u16())),
        }
    }
}

#[async_trait]
impl Mojang for MojangApi {
    #[tracing::instrument(skip(self))]
    async fn fetch_uuids(
        &self,
        usernames: &[String],
    ) -> Result<Vec<UsernameResolved>, DermaError> {
        // split into requests with ten or fewer usernames
        let mut resolved = vec![];
        for chunk in usernames.chunks(UUIDS_CHUNK_SIZE) {
            resolved.extend(self.fetch_uuids_chunk(chunk).await?)
        }
        Ok(resolved)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_profile(&self, uuid: &Uuid) -> Result<Option<Profile>, DermaError> {
        let response = self
            .client
            .get(format!("{}/{}", PROFILES_URL, uuid.simple()))
            .query(&[("unsigned", "false")])
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(DermaError::RateLimited),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(DermaError::UnexpectedStatus(status.as_u16())),
        }
    }
}
