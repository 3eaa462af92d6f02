use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod mailer;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(debug_routes: bool) -> Router<AppState> {
    let router = Router::new().merge(handlers::otp_routes());
    if debug_routes {
        router.merge(handlers::debug_routes())
    } else {
        router
    }
}
