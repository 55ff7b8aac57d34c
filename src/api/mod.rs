// ==========================================
// 光伏 BOS 配置引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供命令行与上层界面调用
// ==========================================

pub mod bos_api;
pub mod error;

// 重导出核心类型
pub use bos_api::{BosApi, PostCombineSlotView};
pub use error::{ApiError, ApiResult};
