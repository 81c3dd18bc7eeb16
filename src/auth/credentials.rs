use std::sync::Arc;

use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::warn;

use crate::auth::error::AuthError;
use crate::auth::password::{hash_password, verify_password};
use crate::state::AppState;
use crate::store::{Credential, User, UserStore};

/// How a user is addressed by the password-change flows: by username from
/// the forgot form, by email from a verified reset token.
#[derive(Debug, Clone, Copy)]
pub enum Identifier<'a> {
    Username(&'a str),
    Email(&'a str),
}

/// Credential operations over whichever `UserStore` backs the app, so
/// callers never branch on the storage backend.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn UserStore>,
}

impl FromRef<AppState> for CredentialStore {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone())
    }
}

impl CredentialStore {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Create a password account. The store's insert is atomic with respect
    /// to the uniqueness check, so a lost race reports `AlreadyExists`.
    pub async fn create(
        &self,
        username: &str,
        raw_password: &str,
        email: &str,
    ) -> Result<User, AuthError> {
        let hash = hash_password(raw_password)?;
        let user = User {
            username: username.to_string(),
            email: email.to_string(),
            credential: Credential::Local { hash },
            created_at: OffsetDateTime::now_utc(),
        };
        Ok(self.store.insert(user).await?)
    }

    /// Create an account linked from the OAuth provider. It carries no
    /// local password and can never pass `verify`.
    pub async fn create_external(&self, username: &str, email: &str) -> Result<User, AuthError> {
        let user = User {
            username: username.to_string(),
            email: email.to_string(),
            credential: Credential::External,
            created_at: OffsetDateTime::now_utc(),
        };
        Ok(self.store.insert(user).await?)
    }

    /// An unknown username and a wrong password are the same
    /// `InvalidCredentials` outcome; nothing distinguishes the two to the
    /// caller.
    pub async fn verify(&self, username: &str, raw_password: &str) -> Result<User, AuthError> {
        let Some(user) = self.store.get(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        let ok = match user.credential.local_hash() {
            Some(hash) => verify_password(raw_password, hash)?,
            // External account: no password can be valid for it.
            None => {
                warn!(username = %user.username, "password login against external account");
                false
            }
        };
        if ok {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    pub async fn update_password(
        &self,
        identifier: Identifier<'_>,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let username = match identifier {
            Identifier::Username(username) => username.to_string(),
            Identifier::Email(email) => self
                .store
                .find_by_email(email)
                .await?
                .ok_or(AuthError::NotFound)?
                .username,
        };
        let hash = hash_password(new_password)?;
        let updated = self
            .store
            .set_credential(&username, Credential::Local { hash })
            .await?;
        if !updated {
            return Err(AuthError::NotFound);
        }
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.store.find_by_email(email).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::MemoryUserStore;

    use super::*;

    fn credentials() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryUserStore::new()))
    }

    #[tokio::test]
    async fn signup_then_login_scenario() {
        let credentials = credentials();
        credentials
            .create("alice", "pw1", "alice@example.com")
            .await
            .expect("create");

        let user = credentials.verify("alice", "pw1").await.expect("verify");
        assert_eq!(user.username, "alice");

        let err = credentials.verify("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_signup_reports_already_exists() {
        let credentials = credentials();
        credentials
            .create("alice", "pw1", "alice@example.com")
            .await
            .expect("create");
        let err = credentials
            .create("alice", "pw2", "other@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let credentials = credentials();
        credentials
            .create("alice", "pw1", "alice@example.com")
            .await
            .expect("create");

        let unknown = credentials.verify("nobody", "pw1").await.unwrap_err();
        let wrong = credentials.verify("alice", "wrong").await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn update_password_by_username_and_email() {
        let credentials = credentials();
        credentials
            .create("bob", "old-pw", "bob@example.com")
            .await
            .expect("create");

        credentials
            .update_password(Identifier::Username("bob"), "via-username")
            .await
            .expect("update");
        assert!(credentials.verify("bob", "via-username").await.is_ok());
        assert!(credentials.verify("bob", "old-pw").await.is_err());

        credentials
            .update_password(Identifier::Email("bob@example.com"), "via-email")
            .await
            .expect("update");
        assert!(credentials.verify("bob", "via-email").await.is_ok());
    }

    #[tokio::test]
    async fn update_password_misses_report_not_found() {
        let credentials = credentials();
        let err = credentials
            .update_password(Identifier::Username("ghost"), "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));

        let err = credentials
            .update_password(Identifier::Email("ghost@example.com"), "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn external_accounts_never_pass_password_verify() {
        let credentials = credentials();
        credentials
            .create_external("Jane Doe", "jane@example.com")
            .await
            .expect("create");

        for guess in ["", "google-oauth", "hunter2"] {
            let err = credentials.verify("Jane Doe", guess).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }
}
