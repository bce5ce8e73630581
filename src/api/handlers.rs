use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::CookieConfig;
use crate::presence::PresenceTracker;
use crate::storage::{Storage, StorageError};

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub presence: Arc<PresenceTracker>,
    pub cookie: CookieConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct ViewsResponse {
    pub views: i64,
}

#[derive(Serialize)]
pub struct DayCountsResponse {
    pub today: i64,
    pub yesterday: i64,
}

#[derive(Serialize)]
pub struct UniqueUsersResponse {
    pub unique_users: i64,
}

#[derive(Serialize)]
pub struct OnlineResponse {
    pub online_count: i64,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Today's date from wall-clock local time truncated to midnight.
fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn yesterday_of(day: NaiveDate) -> NaiveDate {
    day.pred_opt().unwrap_or(day)
}

/// Generate a fresh visitor identifier.
fn generate_visitor_id() -> String {
    Uuid::new_v4().to_string()
}

/// Extract the visitor identifier from the request's Cookie header.
fn visitor_id_from_cookies(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == cookie_name).then(|| value.to_string())
    })
}

fn session_cookie(config: &CookieConfig, visitor_id: &str) -> String {
    format!(
        "{}={}; Max-Age={}; Path=/; SameSite=Lax",
        config.name, visitor_id, config.max_age_secs
    )
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Record a page view
///
/// Increments today's bucket first, then upserts the visitor registry and
/// touches the presence tracker; a partial failure leaves the view counted
/// with visitor bookkeeping lagging by one event. The cookie is refreshed
/// on every request.
pub async fn increment_views(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<ViewsResponse>), (StatusCode, Json<ErrorResponse>)> {
    let now = Utc::now().timestamp();

    let views = match state.storage.record_view(local_today()).await {
        Ok(count) => count,
        Err(e) => return Err(internal_error(e)),
    };

    let incoming = visitor_id_from_cookies(&headers, &state.cookie.name);
    let visitor_id = match incoming {
        Some(id) => match state.storage.upsert_visitor(&id, now).await {
            Ok((visitor, _)) => visitor.visitor_id,
            Err(StorageError::InvalidIdentifier) => {
                tracing::warn!("Rejected malformed visitor cookie, issuing a new identifier");
                register_fresh_visitor(&state, now).await?
            }
            Err(e) => return Err(internal_error(e)),
        },
        None => register_fresh_visitor(&state, now).await?,
    };

    state.presence.touch(&visitor_id, now);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        session_cookie(&state.cookie, &visitor_id).parse().unwrap(),
    );

    Ok((response_headers, Json(ViewsResponse { views })))
}

async fn register_fresh_visitor(
    state: &AppState,
    now: i64,
) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let fresh = generate_visitor_id();
    match state.storage.upsert_visitor(&fresh, now).await {
        Ok((visitor, _)) => Ok(visitor.visitor_id),
        Err(e) => Err(internal_error(e)),
    }
}

/// View counts for today and yesterday
pub async fn get_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DayCountsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let today = local_today();

    let today_count = match state.storage.views_on(today).await {
        Ok(count) => count,
        Err(e) => return Err(internal_error(e)),
    };
    let yesterday_count = match state.storage.views_on(yesterday_of(today)).await {
        Ok(count) => count,
        Err(e) => return Err(internal_error(e)),
    };

    Ok(Json(DayCountsResponse {
        today: today_count,
        yesterday: yesterday_count,
    }))
}

/// Total number of distinct visitors ever seen
pub async fn get_unique_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UniqueUsersResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.storage.visitor_count().await {
        Ok(unique_users) => Ok(Json(UniqueUsersResponse { unique_users })),
        Err(e) => Err(internal_error(e)),
    }
}

/// Number of visitors seen within the presence window
pub async fn get_online_count(State(state): State<Arc<AppState>>) -> Json<OnlineResponse> {
    let online_count = state.presence.online_count(Utc::now().timestamp());
    Json(OnlineResponse { online_count })
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
