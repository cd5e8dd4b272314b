use crate::connection::ActorId;
use crate::error::Error;

/// Scheme prefix a client must put in front of its token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Resolves a raw bearer token (prefix already stripped) to the actor it was
/// issued for. Implementations return `PushErrorKind::InvalidToken` for any
/// token they cannot vouch for.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<ActorId, Error>;
}

/// Strips the bearer prefix, returning `None` if it is missing or nothing
/// follows it.
pub fn strip_bearer(value: &str) -> Option<&str> {
    value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
