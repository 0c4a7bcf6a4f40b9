use axum::{extract::State, response::IntoResponse};
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::response::success;
use super::AppState;

/// 健康检查端点
pub async fn healthcheck(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.database.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::StoreUnavailable("Database connection failed".to_string())
    })?;

    Ok(success(json!({
        "status": "available",
        "system_info": {
            "environment": state.config.environment,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })))
}
