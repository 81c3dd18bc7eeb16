use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use tower_sessions::Session;
use tracing::debug;

use crate::auth::error::AuthError;

const SESSION_USERNAME_KEY: &str = "username";
const OAUTH_STATE_KEY: &str = "oauth.csrf_state";
const OAUTH_VERIFIER_KEY: &str = "oauth.pkce_verifier";

/// The association between the current request context and an
/// authenticated username. A thin layer over the transport session; one
/// session per context, `start` overwrites any prior association.
pub struct AuthSession {
    session: Session,
}

impl AuthSession {
    pub async fn start(&self, username: &str) -> Result<(), AuthError> {
        self.session
            .insert(SESSION_USERNAME_KEY, username.to_string())
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        debug!(username = %username, "session started");
        Ok(())
    }

    pub async fn current(&self) -> Result<Option<String>, AuthError> {
        self.session
            .get::<String>(SESSION_USERNAME_KEY)
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))
    }

    pub async fn end(&self) -> Result<(), AuthError> {
        self.session
            .flush()
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))
    }

    /// Park the CSRF state and PKCE verifier while the user is away at the
    /// provider's consent screen.
    pub async fn stash_oauth_state(&self, state: &str, verifier: &str) -> Result<(), AuthError> {
        self.session
            .insert(OAUTH_STATE_KEY, state.to_string())
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        self.session
            .insert(OAUTH_VERIFIER_KEY, verifier.to_string())
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        Ok(())
    }

    /// Remove and return the parked (state, verifier) pair; each stash is
    /// good for one callback.
    pub async fn take_oauth_state(&self) -> Result<Option<(String, String)>, AuthError> {
        let state = self
            .session
            .remove::<String>(OAUTH_STATE_KEY)
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        let verifier = self
            .session
            .remove::<String>(OAUTH_VERIFIER_KEY)
            .await
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e)))?;
        Ok(state.zip(verifier))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(AuthSession { session })
    }
}
