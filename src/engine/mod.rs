// ==========================================
// 光伏 BOS 配置引擎 - 引擎层
// ==========================================
// 职责: 设备状态提取、配置匹配、合并规则、槽位分配、自动填充
// 红线: Engine 不拼 SQL, 所有数据访问经由 repository
// 红线: 每个匹配结果必须携带计算说明（sizing.calculation）
// ==========================================

pub mod auto_population;
pub mod bos_catalog;
pub mod combination;
pub mod detectors;
pub mod error;
pub mod extractor;
pub mod notifications;
pub mod orchestrator;
pub mod sizing;
pub mod slot_allocator;
pub mod spec_lookup;
pub mod switchboard;
pub mod workflow;

// 重导出核心引擎
pub use auto_population::{
    AutoPopulationGuard, AutoPopulationOptions, AutoPopulationReport, AutoPopulationService,
    SystemPopulationReport,
};
pub use bos_catalog::{BosCatalog, CatalogSelection};
pub use combination::{
    apply_combination_rules, generate_combine_options, validate_combine_eligibility,
    CombinationOutcome, CombineEligibility, CombineMode, CombineOption, CombineSettings,
};
pub use detectors::{ConfigurationDetector, DetectionContext};
pub use error::{BosError, BosResult};
pub use extractor::EquipmentExtractor;
pub use notifications::{
    CollectingNotificationSink, NoOpNotificationSink, Notification, NotificationLevel,
    NotificationSink, OptionalNotificationSink,
};
pub use orchestrator::{combined_max_output, BosOrchestrator, DetectionOutcome};
pub use slot_allocator::SlotAllocation;
pub use spec_lookup::{EquipmentSpecLookup, StaticSpecLookup};
pub use switchboard::ConfigurationSwitchboard;
pub use workflow::{ApplySummary, Effect, WorkflowEvent, WorkflowState};
