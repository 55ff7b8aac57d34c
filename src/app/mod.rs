// ==========================================
// 光伏 BOS 配置引擎 - 应用层
// ==========================================
// 职责: 装配仓储、引擎与 API，供命令行入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
