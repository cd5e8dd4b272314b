//! HS256 bearer tokens for passengers and drivers.
//!
//! Tokens are issued by the account service; this module only needs to
//! verify them. `JwtKeys::issue` exists for tooling and tests that need a
//! token signed with the same secret.
//!
//! # Example
//!
//! ```rust
//! use domain::jwt::JwtKeys;
//! use push::{ActorId, TokenVerifier};
//! use std::time::Duration;
//!
//! let keys = JwtKeys::new("a-shared-secret");
//! let actor = ActorId::driver("5a4b0f7e-7d5e-4a27-9a4e-1a0c2a0f7b11");
//! let token = keys.issue(&actor, Duration::from_secs(60)).unwrap();
//! assert_eq!(keys.verify(&token).unwrap(), actor);
//! ```

use crate::error::Error;
use claims::{ActorClaims, Role};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use push::{ActorId, ActorRole, PushErrorKind, TokenVerifier};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) mod claims;

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Signs a token for `actor` that expires after `ttl`.
    pub fn issue(&self, actor: &ActorId, ttl: Duration) -> Result<String, Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let claims = ActorClaims {
            sub: actor.id.clone(),
            role: match actor.role {
                ActorRole::Passenger => Role::Passenger,
                ActorRole::Driver => Role::Driver,
            },
            exp: (now + ttl).as_secs() as usize,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}

impl TokenVerifier for JwtKeys {
    fn verify(&self, token: &str) -> Result<ActorId, push::Error> {
        let data = decode::<ActorClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Rejected bearer token: {e}");
            push::Error::with_source(PushErrorKind::InvalidToken, e)
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(push::Error::new(PushErrorKind::InvalidToken));
        }
        Ok(match claims.role {
            Role::Passenger => ActorId::passenger(claims.sub),
            Role::Driver => ActorId::driver(claims.sub),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_to_the_same_actor() {
        let keys = JwtKeys::new("secret");
        let passenger = ActorId::passenger("p-1");

        let token = keys.issue(&passenger, Duration::from_secs(300)).unwrap();

        assert_eq!(keys.verify(&token).unwrap(), passenger);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = JwtKeys::new("other")
            .issue(&ActorId::driver("d-1"), Duration::from_secs(300))
            .unwrap();

        let err = JwtKeys::new("secret").verify(&token).unwrap_err();
        assert_eq!(err.error_kind, PushErrorKind::InvalidToken);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let keys = JwtKeys::new("secret");
        let claims = ActorClaims {
            sub: "d-1".to_string(),
            role: Role::Driver,
            exp: 1_000,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret"))
            .unwrap();

        assert_eq!(
            keys.verify(&token).unwrap_err().error_kind,
            PushErrorKind::InvalidToken
        );
    }

    #[test]
    fn garbage_is_rejected() {
        let err = JwtKeys::new("secret").verify("not-a-jwt").unwrap_err();
        assert_eq!(err.error_kind, PushErrorKind::InvalidToken);
    }
}
