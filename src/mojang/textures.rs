use crate::emitter::{Emitter, Event};
use crate::error::DermaError;
use crate::mojang::{Mojang, Profile, TexturesProvider};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// The [TexturesProvider] backed by the mojang session endpoint.
///
/// Profiles are requested signed, so the `textures` property carries a detached
/// signature. `Ok(None)` means the identity has no profile; rate limits and other
/// unexpected statuses surface unchanged from the [Mojang] client. No retries.
pub struct SignedTexturesProvider {
    api: Arc<dyn Mojang>,
    emitter: Arc<Emitter>,
}

impl SignedTexturesProvider {
    pub fn new(api: Arc<dyn Mojang>, emitter: Arc<Emitter>) -> Self {
        Self { api, emitter }
    }
}

#[async_trait]
impl TexturesProvider for SignedTexturesProvider {
    #[tracing::instrument(skip(self))]
    async fn get_textures(&self, uuid: &Uuid) -> Result<Option<Profile>, DermaError> {
        self.emitter.emit(Event::TexturesBeforeCall { id: *uuid });
        let result = self.api.fetch_profile(uuid).await;
        self.emitter.emit(Event::TexturesAfterCall {
            id: *uuid,
            textures: result.as_ref().ok().cloned().flatten(),
            error: result.as_ref().err().cloned(),
        });
        result
    }
}
