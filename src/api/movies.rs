use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};

use super::error::{ApiError, ApiResult};
use super::response::{created, success, success_message, MovieListResponse};
use super::AppState;
use crate::models::{CreateMovieRequest, ListMoviesParams, Movie, UpdateMovieRequest};
use crate::services::record_in_background;

/// 客户端声明其最后看到的版本
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// 列出电影：全文搜索、类型过滤、排序、分页
pub async fn list_movies(
    State(state): State<AppState>,
    params: Result<Query<ListMoviesParams>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filters = state.filter_validator.validate(&params)?;

    let (movies, metadata) = state.movies.get_all(&filters).await?;

    if let Some(search_text) = filters.search_text.clone() {
        record_in_background(
            &state.tasks,
            state.movies.clone(),
            search_text,
            metadata.total_records,
        );
    }

    Ok(MovieListResponse { movies, metadata })
}

/// 创建电影
pub async fn create_movie(
    State(state): State<AppState>,
    payload: Result<Json<CreateMovieRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut movie = Movie::from_create_request(request)?;

    state.movies.insert(&mut movie).await?;
    tracing::info!(movie_id = %movie.id, title = %movie.title, "Created movie");

    Ok(created(format!("/v1/movies/{}", movie.id), movie))
}

/// 获取单部电影
pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let movie = state.movies.get(&id).await?;
    Ok(success(movie))
}

/// 部分更新电影
///
/// 带 `X-Expected-Version` 时，版本与当前记录不一致直接返回冲突。
/// 读取与写入之间的并发修改由仓库的版本检查发现。
pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpdateMovieRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let expected_version = expected_version(&headers)?;

    let mut movie = state.movies.get(&id).await?;

    if let Some(expected) = expected_version {
        if expected != movie.version {
            return Err(ApiError::EditConflict);
        }
    }

    movie.apply_update(request)?;
    state.movies.update(&mut movie).await?;

    Ok(success(movie))
}

/// 删除电影
pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.movies.delete(&id).await?;
    Ok(success_message("movie successfully deleted"))
}

fn expected_version(headers: &HeaderMap) -> ApiResult<Option<i32>> {
    let Some(value) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("X-Expected-Version must be an integer".to_string()))
}
