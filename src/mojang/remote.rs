use crate::emitter::{Emitter, Event};
use crate::error::DermaError;
use crate::mojang::{UsernameResolved, UuidsProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;

/// The single-shot [UuidsProvider] (driver `remote`).
///
/// Each lookup is one GET of `<url>/<username>` against a configured endpoint that
/// speaks the mojang single-profile contract: 2xx with a JSON `{id, name}` body is a
/// present identity, 2xx with an empty body is a confirmed negative. There is no
/// coalescing; the endpoint is expected to enforce its own rate policy.
pub struct RemoteUuidsProvider {
    client: reqwest::Client,
    url: String,
    emitter: Arc<Emitter>,
}

impl RemoteUuidsProvider {
    pub fn new(url: String, emitter: Arc<Emitter>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.trim_end_matches('/').to_string(),
            emitter,
        }
    }

    async fn fetch(&self, username: &str) -> Result<Option<UsernameResolved>, DermaError> {
        let response = self
            .client
            .get(format!("{}/{}", self.url, username))
            .send()
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            StatusCode::TOO_MANY_REQUESTS => Err(DermaError::RateLimited),
            status if status.is_success() => {
                let body = response.text().await?;
                if body.is_empty() {
                    return Ok(None);
                }
                serde_json::from_str(&body)
                    .map(Some)
                    .map_err(|err| DermaError::Request(err.to_string()))
            }
            status => Err(DermaError::UnexpectedStatus(status.as_u16())),
        }
    }
}

#[async_trait]
impl UuidsProvider for RemoteUuidsProvider {
    #[tracing::instrument(skip(self))]
    async fn get_uuid(&self, username: &str) -> Result<Option<UsernameResolved>, DermaError> {
        let username = username.to_lowercase();
        self.emitter.emit(Event::UsernamesBeforeCall {
            usernames: vec![username.clone()],
        });
        let result = self.fetch(&username).await;
        self.emitter.emit(Event::UsernamesAfterCall {
            usernames: vec![username],
            resolved: result.iter().flatten().cloned().collect(),
            error: result.as_ref().err().cloned(),
        });
        result
    }
}
