use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum_auth::AuthBearer;
use log::info;
use uuid::Uuid;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::db::{LibraryRecord, crud};
use crate::searcher::Searcher;

/// 用自然语言搜索照片
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchRequest,
    responses(
        (status = 200, body = SearchResponse),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    state.check_token(&token)?;
    let library = resolve_library(&state, req.library_id).await?;
    let library_id = Uuid::parse_str(&library.id)?;

    info!("正在搜索照片库 {}: {}", library.name, req.query);
    let start = Instant::now();

    let manager = state.manager(library_id).await;
    let searcher = Searcher::new(state.db.clone(), state.encoder.clone(), manager)
        .with_threshold(req.threshold.unwrap_or(state.search.threshold));
    let results =
        searcher.search_text(&req.query, req.count.unwrap_or(state.search.count)).await?;

    let mut hits = Vec::with_capacity(results.len());
    for result in results {
        let Some(photo) = crud::get_photo(&state.db, &result.photo_id.to_string()).await? else {
            continue;
        };
        hits.push(SearchHit {
            photo_id: result.photo_id,
            path: photo.path,
            similarity: result.similarity,
        });
    }

    Ok(Json(SearchResponse { time: start.elapsed().as_millis() as u64, result: hits }))
}

/// 列出所有照片库
#[utoipa::path(
    get,
    path = "/libraries",
    responses(
        (status = 200, body = [LibraryInfo]),
    )
)]
pub async fn libraries_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LibraryInfo>>> {
    let mut infos = vec![];
    for library in crud::list_libraries(&state.db).await? {
        let photos = crud::count_photos(&state.db, &library.id).await?;
        let embedded = crud::count_embedded(&state.db, &library.id).await?;
        let library_id = Uuid::parse_str(&library.id)?;
        infos.push(LibraryInfo {
            index_exists: state.conf_dir.index_file(&library_id).exists(),
            id: library.id,
            name: library.name,
            path: library.path,
            photos,
            embedded,
            last_indexed_at: library.last_indexed_at,
        });
    }
    Ok(Json(infos))
}

/// 从磁盘重新加载索引
#[utoipa::path(post, path = "/reload", request_body = ReloadRequest)]
pub async fn reload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(req): Json<ReloadRequest>,
) -> Result<()> {
    state.check_token(&token)?;
    let library = resolve_library(&state, req.library_id).await?;
    let manager = state.manager(Uuid::parse_str(&library.id)?).await;
    manager.load().await?;
    Ok(())
}

async fn resolve_library(state: &AppState, library_id: Option<Uuid>) -> Result<LibraryRecord> {
    match library_id {
        Some(id) => crud::get_library(&state.db, &id.to_string())
            .await?
            .ok_or_else(|| AppError::not_found("找不到指定的照片库")),
        None => {
            let mut libraries = crud::list_libraries(&state.db).await?;
            match libraries.len() {
                1 => Ok(libraries.remove(0)),
                0 => Err(AppError::not_found("尚未创建任何照片库")),
                _ => Err(AppError::not_found("存在多个照片库，请指定 library_id")),
            }
        }
    }
}
