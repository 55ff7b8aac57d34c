// ==========================================
// 光伏 BOS 配置引擎 - 核心库
// ==========================================
// 系统定位: 设计辅助 (最终设备选择由工程师确认)
// 流程: 项目字段 → 设备状态提取 → 配置匹配 → 组合规则 → 槽位分配 → 自动填充
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 设备描述与 BOS 记录
pub mod domain;

// 数据仓储层 - 项目字段与参考数据
pub mod repository;

// 引擎层 - 匹配规则与填充
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BackupOption, BosSection, Confidence, CouplingType, InverterType, PostCombineType,
    SpecialEquipment, SystemNumber, SystemType,
};

// 领域实体
pub use domain::{
    BosEquipmentItem, ConfigurationMatch, FieldPayload, MultiSystemAnalysis, ProjectRecord,
    SystemCombinerPanel, SystemEquipment,
};

// 引擎
pub use engine::{
    AutoPopulationService, BosError, BosOrchestrator, BosResult, ConfigurationSwitchboard,
    EquipmentExtractor, SlotAllocation,
};

// API
pub use api::BosApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "光伏BOS配置引擎";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
