//! Bearer-token authentication.
//!
//! The gateway only needs an [`Identity`] for each caller. How a credential
//! maps to an identity is up to the [`Authenticator`] installed in the
//! application state.

use axum::http::{header, HeaderMap, StatusCode};
use gateway_config::AuthConfig;
use gateway_core::Identity;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Authentication failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer credential was presented
    #[error("Not authenticated")]
    MissingCredentials,

    /// The bearer credential was not accepted
    #[error("Invalid authentication credentials")]
    InvalidCredentials,

    /// The authenticator is not usable
    #[error("Authentication configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredentials => StatusCode::FORBIDDEN,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps a bearer credential to a caller identity
pub trait Authenticator: Send + Sync {
    /// Authenticate `credentials`, the bearer token if one was presented
    ///
    /// # Errors
    /// Returns `MissingCredentials` for `None` and `InvalidCredentials` for a
    /// token that is not accepted.
    fn authenticate(&self, credentials: Option<&str>) -> Result<Identity, AuthError>;
}

/// Extract the bearer token from an `Authorization` header.
///
/// Returns `None` when the header is absent, not valid UTF-8, uses another
/// scheme or carries an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Accepts a single shared secret and reports one fixed identity
pub struct StaticTokenAuthenticator {
    secret_digest: [u8; 32],
    identity: Identity,
}

impl StaticTokenAuthenticator {
    /// Create an authenticator for `secret`
    pub fn new(secret: &SecretString, identity: Identity) -> Self {
        Self {
            secret_digest: digest(secret.expose_secret()),
            identity,
        }
    }

    /// Build from the auth configuration section
    ///
    /// # Errors
    /// Returns error if no secret is configured
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config
            .secret_token
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .ok_or_else(|| AuthError::Configuration("secret token is not set".to_string()))?;

        Ok(Self::new(
            secret,
            Identity::new(config.user_id.clone(), config.tenant_id.clone()),
        ))
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, credentials: Option<&str>) -> Result<Identity, AuthError> {
        let token = credentials.ok_or(AuthError::MissingCredentials)?;

        if constant_time_eq(&digest(token), &self.secret_digest) {
            debug!(user_id = %self.identity.user_id, "Request authenticated");
            Ok(self.identity.clone())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
