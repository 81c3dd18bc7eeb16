use anyhow::Context;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::credentials::CredentialStore;
use crate::auth::error::AuthError;
use crate::config::OAuthConfig;
use crate::store::User;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile fetched from the provider per callback. Folded into a local
/// `User` right away, never persisted on its own.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub display_name: String,
    pub primary_email: String,
}

/// Userinfo response shape.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
    name: Option<String>,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google authorization-code flow with PKCE.
pub struct GoogleOAuth {
    client: ConfiguredClient,
}

impl GoogleOAuth {
    pub fn new(config: &OAuthConfig) -> anyhow::Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string()).context("auth url")?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).context("token url")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_url.clone()).context("redirect url")?,
            );
        Ok(Self { client })
    }

    /// Build the consent URL. The returned CSRF state and PKCE verifier
    /// must be held in the caller's session until the callback.
    pub fn authorize_url(&self) -> (String, String, String) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();
        (
            auth_url.to_string(),
            csrf_state.secret().clone(),
            pkce_verifier.secret().clone(),
        )
    }

    /// Exchange the authorization code for an access token and fetch the
    /// user's profile. A rejected code means the provider denied us.
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: String,
    ) -> Result<ExternalIdentity, AuthError> {
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build oauth http client")?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&http_client)
            .await
            .map_err(|e| {
                warn!(error = %e, "oauth token exchange failed");
                AuthError::OAuthDenied
            })?;

        let profile: GoogleUser = http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .context("fetch userinfo")?
            .json()
            .await
            .context("decode userinfo")?;

        let display_name = match profile.name {
            Some(name) if !name.trim().is_empty() => name,
            // Profiles without a display name fall back to the mailbox name.
            _ => profile
                .email
                .split('@')
                .next()
                .unwrap_or(profile.email.as_str())
                .to_string(),
        };

        Ok(ExternalIdentity {
            display_name,
            primary_email: profile.email,
        })
    }
}

/// Resolve an external identity to a local user: reuse the account whose
/// email matches, otherwise create one with an external credential. The
/// username of a fresh account is derived from the provider display name.
pub async fn complete_login(
    credentials: &CredentialStore,
    identity: ExternalIdentity,
) -> Result<User, AuthError> {
    if let Some(existing) = credentials.find_by_email(&identity.primary_email).await? {
        info!(username = %existing.username, "oauth login matched existing user");
        return Ok(existing);
    }

    let username = identity.display_name.trim();
    let user = credentials
        .create_external(username, &identity.primary_email)
        .await?;
    info!(username = %user.username, "oauth login created user");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::store::{Credential, MemoryUserStore};

    use super::*;

    fn identity(name: &str, email: &str) -> ExternalIdentity {
        ExternalIdentity {
            display_name: name.to_string(),
            primary_email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn callback_with_known_email_reuses_the_account() {
        let credentials = CredentialStore::new(Arc::new(MemoryUserStore::new()));
        credentials
            .create("alice", "pw1", "alice@example.com")
            .await
            .expect("create");

        let user = complete_login(&credentials, identity("Alice Liddell", "alice@example.com"))
            .await
            .expect("link");

        // Reused, not duplicated, and the stored credential is untouched.
        assert_eq!(user.username, "alice");
        assert!(matches!(user.credential, Credential::Local { .. }));
        assert!(credentials.verify("alice", "pw1").await.is_ok());
    }

    #[tokio::test]
    async fn callback_with_fresh_email_creates_one_external_user() {
        let credentials = CredentialStore::new(Arc::new(MemoryUserStore::new()));

        let user = complete_login(&credentials, identity("Jane Doe", "jane@example.com"))
            .await
            .expect("link");
        assert_eq!(user.username, "Jane Doe");
        assert_eq!(user.credential, Credential::External);

        // A second callback for the same identity resolves to the same user.
        let again = complete_login(&credentials, identity("Jane Doe", "jane@example.com"))
            .await
            .expect("link");
        assert_eq!(again.username, "Jane Doe");
    }

    #[tokio::test]
    async fn colliding_username_with_new_email_is_a_conflict() {
        let credentials = CredentialStore::new(Arc::new(MemoryUserStore::new()));
        credentials
            .create("Jane Doe", "pw", "local@example.com")
            .await
            .expect("create");

        let err = complete_login(&credentials, identity("Jane Doe", "jane@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
    }
}
