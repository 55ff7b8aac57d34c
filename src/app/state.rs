// ==========================================
// 光伏 BOS 配置引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::BosApi;
use crate::config::ConfigManager;
use crate::engine::bos_catalog::BosCatalog;
use crate::engine::notifications::{NotificationSink, OptionalNotificationSink};
use crate::engine::{AutoPopulationService, BosOrchestrator, EquipmentExtractor};
use crate::repository::{
    EquipmentSpecRepository, PreferredEquipmentRepository, ProjectStore, SqliteProjectStore,
    UtilityRequirementsRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源（单一 SQLite 连接）
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// BOS 业务API
    pub bos_api: Arc<BosApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 参考数据仓储（用于导入电力公司要求 / 设备规格 / 偏好设备）
    pub utility_repo: Arc<UtilityRequirementsRepository>,
    pub spec_repo: Arc<EquipmentSpecRepository>,
    pub preferred_repo: Arc<PreferredEquipmentRepository>,
}

impl AppState {
    /// 创建新的AppState实例（不发布通知）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::build(db_path, OptionalNotificationSink::none())
    }

    /// 创建AppState，并把工作流通知发布到指定接收方
    pub fn with_notification_sink(
        db_path: String,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, String> {
        Self::build(db_path, OptionalNotificationSink::with_sink(sink))
    }

    /// 该方法会：
    /// 1. 打开数据库并初始化 schema（幂等）
    /// 2. 初始化所有Repository
    /// 3. 初始化引擎与API实例
    fn build(db_path: String, notifier: OptionalNotificationSink) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let store: Arc<dyn ProjectStore> = Arc::new(SqliteProjectStore::from_connection(conn.clone()));
        let utility_repo = Arc::new(UtilityRequirementsRepository::from_connection(conn.clone()));
        let spec_repo = Arc::new(EquipmentSpecRepository::from_connection(conn.clone()));
        let preferred_repo = Arc::new(PreferredEquipmentRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let catalog = Arc::new(
            BosCatalog::bundled().map_err(|e| format!("无法加载BOS设备目录: {}", e))?,
        );
        let population = AutoPopulationService::new(store.clone(), catalog)
            .with_preferred_repo(preferred_repo.clone());
        let extractor = EquipmentExtractor::new(spec_repo.clone());
        let orchestrator = Arc::new(
            BosOrchestrator::new(store.clone(), extractor, population)
                .with_utility_repo(utility_repo.clone())
                .with_notifier(notifier),
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let bos_api = Arc::new(BosApi::new(store, orchestrator, config_manager.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            bos_api,
            config_manager,
            utility_repo,
            spec_repo,
            preferred_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 SOLAR_BOS_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SOLAR_BOS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./solar_bos.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("solar-bos-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("solar-bos");
        }

        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&path).is_ok() {
            path = path.join("solar_bos.db");
        } else {
            path = PathBuf::from("./solar_bos.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_initializes_schema() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let state = AppState::new(path.clone()).unwrap();
        assert_eq!(state.db_path, path);
        assert_eq!(state.utility_repo.find("APS", None).unwrap(), None);
    }
}
