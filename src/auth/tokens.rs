use std::collections::HashSet;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::error::TokenError;
use crate::state::AppState;

/// Purpose salt for password-reset tokens.
pub const RESET_SALT: &str = "reset-salt";

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String, // email the token authorizes an action for
    iat: i64,
}

/// Stateless signer/verifier over the process-wide secret.
///
/// The purpose salt is folded into the signing key, so a token issued for
/// one flow fails signature verification when presented for another.
#[derive(Clone)]
pub struct TokenKeys {
    secret: String,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.config.secret_key.clone())
    }
}

impl TokenKeys {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn scoped_key(&self, salt: &str) -> Vec<u8> {
        format!("{}.{}", self.secret, salt).into_bytes()
    }

    /// Sign `email` under `salt`, stamped with the current time.
    pub fn issue(&self, email: &str, salt: &str) -> anyhow::Result<String> {
        self.issue_at(email, salt, OffsetDateTime::now_utc())
    }

    fn issue_at(
        &self,
        email: &str,
        salt: &str,
        issued_at: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let claims = TokenClaims {
            sub: email.to_string(),
            iat: issued_at.unix_timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.scoped_key(salt)),
        )?;
        debug!(salt = %salt, "token issued");
        Ok(token)
    }

    /// Check the signature under `salt`, then the token age. Signature
    /// first: a tampered token is `BadSignature` even when it is also old,
    /// and only a genuine token can report `Expired`.
    pub fn verify(
        &self,
        token: &str,
        salt: &str,
        max_age_secs: u64,
    ) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(&self.scoped_key(salt)),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, salt = %salt, "token rejected");
            TokenError::BadSignature
        })?;

        let age = OffsetDateTime::now_utc().unix_timestamp() - data.claims.iat;
        if age > max_age_secs as i64 {
            return Err(TokenError::Expired);
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    const TTL: u64 = 3600;

    fn keys() -> TokenKeys {
        let state = crate::state::AppState::fake();
        TokenKeys::from_ref(&state)
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = keys();
        let token = keys.issue("bob@example.com", RESET_SALT).expect("issue");
        let email = keys.verify(&token, RESET_SALT, TTL).expect("verify");
        assert_eq!(email, "bob@example.com");
    }

    #[test]
    fn wrong_salt_fails_signature_even_before_expiry() {
        let keys = keys();
        let token = keys.issue("bob@example.com", RESET_SALT).expect("issue");
        let err = keys.verify(&token, "verify-email-salt", TTL).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn stale_token_expires_and_never_reports_bad_signature() {
        let keys = keys();
        let issued_at = OffsetDateTime::now_utc() - Duration::seconds(TTL as i64 + 1);
        let token = keys
            .issue_at("bob@example.com", RESET_SALT, issued_at)
            .expect("issue");
        let err = keys.verify(&token, RESET_SALT, TTL).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn token_just_inside_ttl_still_verifies() {
        let keys = keys();
        let issued_at = OffsetDateTime::now_utc() - Duration::seconds(TTL as i64 - 60);
        let token = keys
            .issue_at("bob@example.com", RESET_SALT, issued_at)
            .expect("issue");
        assert!(keys.verify(&token, RESET_SALT, TTL).is_ok());
    }

    #[test]
    fn single_byte_mutation_breaks_the_signature() {
        let keys = keys();
        let token = keys.issue("bob@example.com", RESET_SALT).expect("issue");

        let mut bytes = token.into_bytes();
        let pos = bytes.len() / 2;
        bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).expect("still utf8");

        let err = keys.verify(&tampered, RESET_SALT, TTL).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn different_secrets_do_not_cross_verify() {
        let token = keys().issue("bob@example.com", RESET_SALT).expect("issue");
        let other = TokenKeys::new("another-secret");
        let err = other.verify(&token, RESET_SALT, TTL).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }
}
