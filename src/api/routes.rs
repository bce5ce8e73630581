use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::CookieConfig;
use crate::presence::PresenceTracker;
use crate::storage::Storage;

use super::handlers::{
    get_count, get_online_count, get_unique_users, health_check, increment_views, AppState,
};

pub fn create_router(
    storage: Arc<dyn Storage>,
    presence: Arc<PresenceTracker>,
    cookie: CookieConfig,
) -> Router {
    let state = Arc::new(AppState {
        storage,
        presence,
        cookie,
    });

    Router::new()
        .route("/increment", post(increment_views))
        .route("/count", get(get_count))
        .route("/unique_users", get(get_unique_users))
        .route("/online", get(get_online_count))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
