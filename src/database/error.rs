// 仓库错误类型定义
//
// 业务结果（未找到、版本冲突）与存储故障分开，调用方据此决定重试还是放弃

use std::time::Duration;
use thiserror::Error;

/// 仓库操作的统一错误类型
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    /// 记录已被其他写入方修改，需重新获取后重试
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("record conflicts with an existing record")]
    Conflict,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("store query timed out after {0:?}")]
    Timeout(Duration),

    #[error("stored record could not be decoded: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepositoryError::Conflict,
            _ => RepositoryError::StoreUnavailable(err),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: RepositoryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[test]
    fn test_transport_errors_are_store_unavailable() {
        let err: RepositoryError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, RepositoryError::StoreUnavailable(_)));
    }

    #[test]
    fn test_edit_conflict_message() {
        assert_eq!(
            RepositoryError::EditConflict.to_string(),
            "unable to update the record due to an edit conflict, please try again"
        );
    }
}
