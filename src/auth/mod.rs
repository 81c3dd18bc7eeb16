use crate::state::AppState;
use axum::Router;

pub mod credentials;
mod dto;
pub mod error;
pub mod handlers;
pub mod oauth;
pub mod password;
pub mod session;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
