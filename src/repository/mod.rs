// ==========================================
// 光伏 BOS 配置引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod equipment_spec_repo;
pub mod error;
pub mod preferred_equipment_repo;
pub mod project_store;
pub mod utility_requirements_repo;

// 重导出核心仓储
pub use equipment_spec_repo::EquipmentSpecRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use preferred_equipment_repo::PreferredEquipmentRepository;
pub use project_store::{InMemoryProjectStore, ProjectStore, SqliteProjectStore};
pub use utility_requirements_repo::UtilityRequirementsRepository;
