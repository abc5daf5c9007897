//! Credential provider seam for broker authentication.
//!
//! The session never caches tokens itself: it asks the provider once per
//! connection attempt, and reports authentication rejections back so the
//! provider can refresh before the automatic retry fires with a stale
//! credential.

use async_trait::async_trait;

/// Supplies bearer tokens for broker connect frames.
///
/// Implementations typically wrap the app's token store and its refresh
/// flow. The default `auth_rejected` is a no-op for providers whose
/// tokens cannot go stale.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return the bearer token to use for the next connection attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if no credential can be produced; the session
    /// treats this like a failed attempt and retries on its backoff
    /// schedule.
    async fn bearer_token(&self) -> anyhow::Result<String>;

    /// Called when the broker rejects the connect frame as unauthorized.
    ///
    /// Runs before the next attempt's `bearer_token` call, giving the
    /// provider a chance to refresh.
    async fn auth_rejected(&self) {}
}

/// Provider for a fixed, externally-managed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap an already-acquired bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn bearer_token(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}
