mod api;
mod error;
mod state;
mod types;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;
use utoipa::OpenApi;

pub use self::state::*;

#[derive(OpenApi)]
#[openapi(
    paths(api::search_handler, api::libraries_handler, api::reload_handler),
    components(schemas(
        types::SearchRequest,
        types::SearchResponse,
        types::SearchHit,
        types::ReloadRequest,
        types::LibraryInfo,
    ))
)]
pub struct ApiDoc;

/// 构建 API 服务器
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(api::search_handler))
        .route("/libraries", get(api::libraries_handler))
        .route("/reload", post(api::reload_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        // 请求体限制：64K，接口只收 JSON
        .layer(RequestBodyLimitLayer::new(1024 * 64))
        .with_state(state)
}

async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
