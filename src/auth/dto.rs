use serde::{Deserialize, Serialize};

/// Form body for login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Form body for signup.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

/// Form body for the direct (demo-grade) forgot-password flow; `password`
/// is the replacement password, no token involved.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub username: String,
    pub password: String,
}

/// Form body requesting a reset link by mail.
#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    pub email: String,
}

/// Form body completing a token-authorized reset.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub password: String,
}

/// Query parameters the provider sends back to the callback route.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    #[serde(rename = "state")]
    pub csrf_state: Option<String>,
    pub error: Option<String>,
}

/// User-visible outcome of a flow that does not redirect.
#[derive(Debug, Serialize)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub username: String,
    pub email: String,
}
