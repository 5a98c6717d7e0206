/// The error type shared by the textures pipeline and its providers.
///
/// The enum is [Clone] so that a single upstream failure can be delivered to every
/// waiter of a batch dispatch round. Transport errors are therefore captured by
/// their display form instead of wrapping [reqwest::Error] directly.
///
/// "Username has no identity" and "identity has no textures" are not errors; they
/// are successful `None` results and may be cached as negatives.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DermaError {
    /// The username is empty, too long or contains characters outside `[A-Za-z0-9_]`.
    /// Rejected before any upstream call and never cached.
    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    /// The mojang api answered with 429. Never cached.
    #[error("mojang api rate limit exceeded")]
    RateLimited,

    /// The request to the mojang api failed in transport or decoding.
    #[error("mojang api request failed: {0}")]
    Request(String),

    /// The mojang api answered with a status the wire contract does not cover.
    #[error("mojang api responded with unexpected status {0}")]
    UnexpectedStatus(u16),

    /// A profile carried a textures property that could not be decoded.
    #[error("invalid profile textures: {0}")]
    InvalidTextures(String),

    /// The batch dispatcher went away while callers were still waiting on it.
    #[error("uuids provider shut down")]
    Shutdown,
}

impl From<reqwest::Error> for DermaError {
    fn from(err: reqwest::Error) -> Self {
        DermaError::Request(err.to_string())
    }
}
