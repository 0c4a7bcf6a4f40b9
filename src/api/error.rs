use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::database::RepositoryError;
use crate::models::ValidationErrors;

/// 统一的API错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 字段级验证错误
    Validation(ValidationErrors),
    /// 未找到资源
    NotFound(String),
    /// 版本不一致，调用方需重新获取后再提交
    EditConflict,
    /// 冲突错误（如重复创建）
    Conflict(String),
    /// 存储不可用或超时
    StoreUnavailable(String),
    /// 请求参数错误
    BadRequest(String),
    /// 内部服务器错误
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(errors) => write!(f, "Validation error: {}", errors),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::EditConflict => write!(f, "Edit conflict"),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

/// 从仓库错误转换
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => {
                ApiError::NotFound("the requested resource could not be found".to_string())
            }
            RepositoryError::EditConflict => ApiError::EditConflict,
            RepositoryError::Conflict => ApiError::Conflict(err.to_string()),
            RepositoryError::StoreUnavailable(_) | RepositoryError::Timeout(_) => {
                ApiError::StoreUnavailable(err.to_string())
            }
            RepositoryError::Corrupt(_) => ApiError::Internal(err.to_string()),
        }
    }
}

/// 从anyhow::Error转换
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// 实现IntoResponse，将错误转换为HTTP响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, fields) = match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "one or more fields failed validation".to_string(),
                Some(errors),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::EditConflict => (
                StatusCode::CONFLICT,
                "edit_conflict",
                "unable to update the record due to an edit conflict, please try again".to_string(),
                None,
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::StoreUnavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "the server is temporarily unable to handle the request".to_string(),
                    None,
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "type": error_type,
            "message": message,
        });
        if let Some(fields) = fields {
            error["fields"] = json!(fields);
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

/// Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;
