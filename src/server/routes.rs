//! JSON routes over the recommendation service
//!
//! Handlers only see `HttpRequest`/`HttpResponse`; the socket stays in
//! `server::mod`.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use super::microserver::{HttpRequest, HttpResponse};
use crate::cache::CacheStats;
use crate::error::RecError;
use crate::model::{Item, ItemId, NewItem, RankedResult, Reaction};
use crate::service::{RecommendationService, DEFAULT_LIMIT};

/// State shared by every connection thread
pub struct ServerState {
    pub service: Arc<RecommendationService>,
    start_time: Instant,
    version: &'static str,
}

impl ServerState {
    pub fn new(service: Arc<RecommendationService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    items: usize,
    cache: CacheStats,
}

#[derive(Deserialize)]
struct RecommendationRequest {
    #[serde(alias = "userId")]
    user_id: String,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default = "default_exclude", alias = "excludeAuthorPosts")]
    exclude_author_posts: bool,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn default_exclude() -> bool {
    true
}

/// Item as returned to clients: everything but the embedding
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ItemView {
    pub id: ItemId,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub approve_count: u64,
    pub reject_count: u64,
    pub comment_count: u64,
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            author_id: item.author_id.clone(),
            text: item.text.clone(),
            created_at: item.created_at,
            approve_count: item.approve_count,
            reject_count: item.reject_count,
            comment_count: item.comment_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub recommendations: Vec<ItemView>,
    pub total_count: usize,
    pub computed_at: DateTime<Utc>,
}

impl From<&RankedResult> for RecommendationResponse {
    fn from(result: &RankedResult) -> Self {
        let recommendations: Vec<ItemView> = result
            .items
            .iter()
            .map(|scored| ItemView::from(scored.item.as_ref()))
            .collect();
        Self {
            user_id: result.user_id.clone(),
            total_count: recommendations.len(),
            recommendations,
            computed_at: result.computed_at,
        }
    }
}

fn json_error(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &serde_json::json!({"error": message}))
}

fn rec_error(err: &RecError) -> HttpResponse {
    let status = err.status();
    if status >= 500 {
        error!(status, error = %err, "request failed");
    } else {
        debug!(status, error = %err, "request rejected");
    }
    json_error(status, &err.to_string())
}

fn parse_body<T: serde::de::DeserializeOwned>(request: &HttpRequest) -> Result<T, HttpResponse> {
    if request.body.is_empty() {
        return Err(json_error(400, "Missing request body"));
    }
    serde_json::from_slice(&request.body)
        .map_err(|e| json_error(400, &format!("Invalid JSON: {}", e)))
}

/// Dispatch one request
pub fn route_request(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let segments: Vec<&str> = request
        .path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let response = match (request.method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => handle_health(state),
        ("POST", ["api", "v1", "recommendations"]) => handle_recommend(request, state),
        ("POST", ["api", "v1", "recommendations", "refresh", user_id]) => {
            match percent_decode_str(user_id).decode_utf8() {
                Ok(user_id) => handle_refresh(&user_id, state),
                Err(_) => json_error(400, "user_id is not valid UTF-8"),
            }
        }
        ("POST", ["api", "v1", "items"]) => handle_create_item(request, state),
        ("GET", ["api", "v1", "items", id]) => handle_get_item(id, state),
        ("POST", ["api", "v1", "reactions"]) => handle_reaction(request, state),
        (_, ["health"])
        | (_, ["api", "v1", "recommendations", ..])
        | (_, ["api", "v1", "items", ..])
        | (_, ["api", "v1", "reactions"]) => json_error(405, "Method not allowed"),
        _ => json_error(404, "Not found"),
    };
    response.with_header("X-Content-Type-Options", "nosniff")
}

fn handle_health(state: &ServerState) -> HttpResponse {
    match state.service.item_count() {
        Ok(items) => HttpResponse::json(
            200,
            &HealthResponse {
                status: "ok",
                version: state.version,
                uptime_secs: state.start_time.elapsed().as_secs(),
                items,
                cache: state.service.cache().stats(),
            },
        ),
        Err(e) => rec_error(&e),
    }
}

fn handle_recommend(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let body: RecommendationRequest = match parse_body(request) {
        Ok(body) => body,
        Err(response) => return response,
    };

    match state
        .service
        .recommend(&body.user_id, body.limit, body.exclude_author_posts)
    {
        Ok(result) => HttpResponse::json(200, &RecommendationResponse::from(result.as_ref())),
        Err(e) => rec_error(&e),
    }
}

fn handle_refresh(user_id: &str, state: &ServerState) -> HttpResponse {
    match state.service.refresh(user_id) {
        Ok(result) => HttpResponse::json(200, &RecommendationResponse::from(result.as_ref())),
        Err(e) => rec_error(&e),
    }
}

fn handle_create_item(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let new_item: NewItem = match parse_body(request) {
        Ok(item) => item,
        Err(response) => return response,
    };

    match state.service.create_item(new_item) {
        Ok(item) => HttpResponse::json(201, &ItemView::from(item.as_ref())),
        Err(e) => rec_error(&e),
    }
}

fn handle_get_item(id: &str, state: &ServerState) -> HttpResponse {
    let Ok(id) = id.parse::<ItemId>() else {
        return json_error(400, &format!("Invalid item id: {}", id));
    };
    match state.service.get_item(id) {
        Ok(item) => HttpResponse::json(200, &ItemView::from(item.as_ref())),
        Err(e) => rec_error(&e),
    }
}

fn handle_reaction(request: &HttpRequest, state: &ServerState) -> HttpResponse {
    let reaction: Reaction = match parse_body(request) {
        Ok(reaction) => reaction,
        Err(response) => return response,
    };

    let id = reaction.id;
    let author = reaction.author_id.clone();
    match state.service.record_reaction(reaction) {
        Ok(()) => HttpResponse::json(
            201,
            &serde_json::json!({"status": "recorded", "reaction_id": id, "author_id": author}),
        ),
        Err(e) => rec_error(&e),
    }
}
