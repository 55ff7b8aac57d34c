// ==========================================
// 光伏 BOS 配置引擎 - 配置层
// ==========================================
// 职责: 系统配置管理（自动填充选项、检测参数）
// 存储: config_kv 表
// ==========================================

pub mod bos_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use bos_config_trait::BosConfigReader;
pub use config_manager::{config_keys, ConfigManager};
