pub mod error;
pub mod health;
pub mod movies;
pub mod response;

use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::database::{Database, MovieRepository};
use crate::lifecycle::BackgroundTasks;
use crate::models::FilterValidator;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub movies: Arc<dyn MovieRepository>,
    pub filter_validator: Arc<FilterValidator>,
    pub tasks: BackgroundTasks,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(database: Database, tasks: BackgroundTasks, config: AppConfig) -> Self {
        let filter_validator = FilterValidator::new(
            config.query.sort_safelist.clone(),
            config.query.max_page_size,
            config.query.default_page_size,
        );

        Self {
            movies: Arc::new(database.repository().clone()),
            database,
            filter_validator: Arc::new(filter_validator),
            tasks,
            config: Arc::new(config),
        }
    }
}

/// 构建所有路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/healthcheck", get(health::healthcheck))
        .route(
            "/v1/movies",
            get(movies::list_movies).post(movies::create_movie),
        )
        .route(
            "/v1/movies/:id",
            get(movies::show_movie)
                .patch(movies::update_movie)
                .delete(movies::delete_movie),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
