use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
