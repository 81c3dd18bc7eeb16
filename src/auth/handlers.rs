use anyhow::Context;
use axum::{
    extract::{FromRef, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        credentials::{CredentialStore, Identifier},
        dto::{
            CallbackParams, ForgotPasswordForm, LoginForm, Notice, PublicUser, ResetPasswordForm,
            ResetRequestForm, SignupForm,
        },
        error::AuthError,
        oauth::{complete_login, GoogleOAuth},
        session::AuthSession,
        tokens::{TokenKeys, RESET_SALT},
    },
    state::AppState,
    store::User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", post(login))
        .route("/signup", post(signup))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-request", post(reset_request))
        .route("/reset/:token", get(reset_check).post(reset_password))
        .route("/google_login", get(google_login))
        .route("/logout", get(logout))
        .route("/index", get(index))
}

async fn home() -> Redirect {
    Redirect::to("/login")
}

#[instrument(skip(state, session, form))]
async fn login(
    State(state): State<AppState>,
    session: AuthSession,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AuthError> {
    let username = form.username.trim();

    let credentials = CredentialStore::from_ref(&state);
    let user = credentials.verify(username, &form.password).await.map_err(|e| {
        warn!(username = %username, "login rejected");
        e
    })?;

    session.start(&user.username).await?;
    info!(username = %user.username, "user logged in");
    Ok(Redirect::to("/index"))
}

#[instrument(skip(state, form))]
async fn signup(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Result<Redirect, AuthError> {
    let username = form.username.trim();

    if form.password != form.confirm_password {
        warn!(username = %username, "signup password confirmation mismatch");
        return Err(AuthError::PasswordMismatch);
    }

    let email = format!("{}@example.com", username);
    let credentials = CredentialStore::from_ref(&state);
    let user = credentials.create(username, &form.password, &email).await?;

    // Creation does not log the new user in; they return to the login form.
    info!(username = %user.username, "account created");
    Ok(Redirect::to("/login"))
}

#[instrument(skip(state, form))]
async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Redirect, AuthError> {
    let username = form.username.trim();

    let credentials = CredentialStore::from_ref(&state);
    credentials
        .update_password(Identifier::Username(username), &form.password)
        .await?;

    info!(username = %username, "password updated via forgot-password");
    Ok(Redirect::to("/login"))
}

#[instrument(skip(state, form))]
async fn reset_request(
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> Result<Json<Notice>, AuthError> {
    let email = form.email.trim().to_lowercase();

    // The response is the same whether or not the address is registered.
    if is_valid_email(&email) {
        let credentials = CredentialStore::from_ref(&state);
        if let Some(user) = credentials.find_by_email(&email).await? {
            let keys = TokenKeys::from_ref(&state);
            let token = keys.issue(&user.email, RESET_SALT)?;
            let link = format!(
                "{}/reset/{}",
                state.config.public_base_url.trim_end_matches('/'),
                token
            );
            let body = format!(
                "Hello {},\n\nUse the link below to reset your weatherly password. \
                 It is valid for one hour.\n\n{}\n",
                user.username, link
            );
            state
                .mailer
                .send(&user.email, "Reset your weatherly password", &body)
                .await
                .context("send reset mail")?;
            info!(username = %user.username, "reset link issued");
        } else {
            debug!("reset requested for unknown email");
        }
    }

    Ok(Json(Notice::new(
        "If that address is registered, a reset link is on its way.",
    )))
}

#[instrument(skip(state, token))]
async fn reset_check(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Notice>, AuthError> {
    let keys = TokenKeys::from_ref(&state);
    keys.verify(&token, RESET_SALT, state.config.reset_ttl_secs)?;
    Ok(Json(Notice::new("Token accepted; submit a new password.")))
}

#[instrument(skip(state, token, form))]
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Redirect, AuthError> {
    let keys = TokenKeys::from_ref(&state);
    let email = keys.verify(&token, RESET_SALT, state.config.reset_ttl_secs)?;

    let credentials = CredentialStore::from_ref(&state);
    credentials
        .update_password(Identifier::Email(&email), &form.password)
        .await?;

    info!("password reset completed");
    Ok(Redirect::to("/login"))
}

#[instrument(skip(state, session, params))]
async fn google_login(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AuthError> {
    let oauth = GoogleOAuth::new(&state.config.oauth)?;

    match authorize_callback(&state, &oauth, &session, params).await {
        Ok(user) => {
            session.start(&user.username).await?;
            info!(username = %user.username, "oauth login completed");
            Ok(Redirect::to("/index").into_response())
        }
        // Not authorized (yet): send the user into the consent flow.
        Err(AuthError::OAuthDenied) => {
            let (url, csrf_state, verifier) = oauth.authorize_url();
            session.stash_oauth_state(&csrf_state, &verifier).await?;
            Ok(Redirect::to(&url).into_response())
        }
        Err(e) => Err(e),
    }
}

async fn authorize_callback(
    state: &AppState,
    oauth: &GoogleOAuth,
    session: &AuthSession,
    params: CallbackParams,
) -> Result<User, AuthError> {
    if let Some(error) = params.error {
        warn!(error = %error, "provider reported an authorization error");
        return Err(AuthError::OAuthDenied);
    }
    let Some(code) = params.code else {
        return Err(AuthError::OAuthDenied);
    };

    let (expected_state, verifier) = session
        .take_oauth_state()
        .await?
        .ok_or(AuthError::OAuthDenied)?;
    if params.csrf_state.as_deref() != Some(expected_state.as_str()) {
        warn!("oauth callback state mismatch");
        return Err(AuthError::OAuthDenied);
    }

    let identity = oauth.exchange_code(&code, verifier).await?;
    let credentials = CredentialStore::from_ref(state);
    complete_login(&credentials, identity).await
}

#[instrument(skip(session))]
async fn logout(session: AuthSession) -> Result<Redirect, AuthError> {
    session.end().await?;
    info!("user logged out");
    Ok(Redirect::to("/login"))
}

#[instrument(skip(state, session))]
async fn index(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response, AuthError> {
    let Some(username) = session.current().await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    match state.users.get(&username).await? {
        Some(user) => Ok(Json(PublicUser {
            username: user.username,
            email: user.email,
        })
        .into_response()),
        // Session points at a user that no longer resolves; drop it.
        None => {
            session.end().await?;
            Ok(Redirect::to("/login").into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_accepts_plain_addresses() {
        assert!(is_valid_email("bob@example.com"));
        assert!(!is_valid_email("bob@example"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two words@example.com"));
    }

    #[test]
    fn notice_serializes_its_message() {
        let notice = Notice::new("Token accepted");
        let json = serde_json::to_string(&notice).unwrap();
        assert!(json.contains("Token accepted"));
    }
}
