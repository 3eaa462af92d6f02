use crate::state::AppState;
use axum::Router;

pub mod client;
mod dto;
pub mod handlers;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::assistant_routes()
}
