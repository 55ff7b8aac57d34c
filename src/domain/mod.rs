// ==========================================
// 光伏 BOS 配置引擎 - 领域层
// ==========================================
// 职责: 定义核心实体与值对象
// 红线: 领域层不访问数据库，不包含匹配规则
// ==========================================

pub mod bos;
pub mod catalog;
pub mod combiner;
pub mod equipment;
pub mod field;
pub mod types;

pub use bos::{
    BosEquipmentItem, ConfigurationMatch, MeterConfiguration, MultiSystemAnalysis,
    MultiSystemConfig, RequiredEquipment, SizingInfo, SystemAnalysis, SystemLanding,
    UtilityMeterKind,
};
pub use catalog::{CatalogEntry, PreferredEquipment};
pub use combiner::{PostCombineBosEntry, SystemCombinerPanel};
pub use equipment::{ExistingBos, ExistingBosEntry, SystemEquipment, UtilityRequirements};
pub use field::{FieldPayload, ProjectRecord};
