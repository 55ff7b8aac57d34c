// ==========================================
// 光伏 BOS 配置引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为用户可读的错误消息
// 红线: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::error::BosError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    /// Post Combine 槽位被系统汇流箱占用
    #[error("槽位不可用: {0}")]
    SlotUnavailable(String),

    #[error("操作进行中: {0}")]
    OperationInProgress(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("项目存储不可用: {0}")]
    StoreUnavailable(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::StoreUnavailable(msg) => ApiError::StoreUnavailable(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 BosError 转换
// ==========================================
impl From<BosError> for ApiError {
    fn from(err: BosError) -> Self {
        match err {
            BosError::SlotUnavailable { .. } => ApiError::SlotUnavailable(err.to_string()),
            BosError::OperationInProgress => ApiError::OperationInProgress(err.to_string()),
            BosError::InvalidSystemNumber(e) => ApiError::InvalidInput(e.to_string()),
            BosError::CatalogLoad(msg) => ApiError::InternalError(msg),
            BosError::CombineIneligible(msg) => ApiError::BusinessRuleViolation(msg),
            BosError::Repository(e) => ApiError::from(e),
            BosError::Other(e) => ApiError::Other(e),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PostCombineType;

    #[test]
    fn test_bos_error_mapping() {
        let err = ApiError::from(BosError::SlotUnavailable {
            kind: PostCombineType::Type3,
        });
        assert!(matches!(err, ApiError::SlotUnavailable(_)));

        let err = ApiError::from(BosError::Repository(RepositoryError::StoreUnavailable(
            "timeout".to_string(),
        )));
        assert!(matches!(err, ApiError::StoreUnavailable(ref m) if m == "timeout"));
    }

    #[test]
    fn test_not_found_message_names_entity() {
        let err = ApiError::from(RepositoryError::NotFound {
            entity: "Project".to_string(),
            id: "p1".to_string(),
        });
        assert_eq!(err.to_string(), "资源未找到: Project(id=p1)不存在");
    }
}
