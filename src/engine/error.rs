// ==========================================
// 光伏 BOS 配置引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::{InvalidSystemNumber, PostCombineType};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum BosError {
    /// 已配置系统汇流箱时 Type 3 无槽位可用
    #[error("Post Combine BOS {kind} 无可用槽位: 系统汇流箱已占用槽位 1")]
    SlotUnavailable { kind: PostCombineType },

    #[error("BOS 自动填充正在进行中")]
    OperationInProgress,

    #[error(transparent)]
    InvalidSystemNumber(#[from] InvalidSystemNumber),

    #[error("设备目录加载失败: {0}")]
    CatalogLoad(String),

    #[error("合并条件不满足: {0}")]
    CombineIneligible(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<csv::Error> for BosError {
    fn from(err: csv::Error) -> Self {
        BosError::CatalogLoad(err.to_string())
    }
}

/// Result 类型别名
pub type BosResult<T> = Result<T, BosError>;
