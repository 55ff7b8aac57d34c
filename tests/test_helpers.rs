// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、项目字段样例与引擎装配
// ==========================================

#![allow(dead_code)]

use serde_json::{json, Value};
use solar_bos::domain::field::{FieldPayload, ProjectRecord};
use solar_bos::engine::bos_catalog::BosCatalog;
use solar_bos::engine::notifications::{CollectingNotificationSink, OptionalNotificationSink};
use solar_bos::engine::spec_lookup::StaticSpecLookup;
use solar_bos::engine::{AutoPopulationService, BosOrchestrator, EquipmentExtractor};
use solar_bos::repository::{InMemoryProjectStore, ProjectStore};
use std::error::Error;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = solar_bos::db::open_sqlite_connection(&db_path)?;
    solar_bos::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// JSON 对象 → 写入载荷
pub fn payload_from_json(value: Value) -> FieldPayload {
    let mut payload = FieldPayload::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            payload.set(key, value);
        }
    }
    payload
}

/// 写入项目初始字段
pub async fn seed_project(store: &dyn ProjectStore, project_uuid: &str, fields: Value) {
    store
        .save_project_fields(project_uuid, &payload_from_json(fields))
        .await
        .unwrap();
}

/// 两个 Sol-Ark 组串系统（APS，已勾选合并）
///
/// # 参数
/// - sys2_existing: 系统 2 逆变器为既有设备（新旧混合）
pub fn sol_ark_combined_fields(sys2_existing: bool) -> Value {
    json!({
        "utility_name": "APS",
        "ele_combine_systems": true,
        "sys1_solar_panel_make": "REC",
        "sys1_solar_panel_qty": 24,
        "sys1_selectedsystem": "inverter",
        "sys1_micro_inverter_make": "Sol-Ark",
        "sys1_micro_inverter_model": "Sol-Ark-15K-2P-N",
        "sys1_micro_inverter_qty": 1,
        "sys1_inv_max_continuous_output": 20,
        "sys2_solar_panel_make": "REC",
        "sys2_solar_panel_qty": 30,
        "sys2_selectedsystem": "inverter",
        "sys2_micro_inverter_make": "Sol-Ark",
        "sys2_micro_inverter_model": "Sol-Ark-15K-2P-N",
        "sys2_micro_inverter_qty": 1,
        "sys2_inv_max_continuous_output": 30,
        "sys2_inverter_existing": sys2_existing,
    })
}

/// 基于内存存储的编排器
pub fn in_memory_orchestrator(
    project_uuid: &str,
    fields: Value,
) -> (Arc<InMemoryProjectStore>, Arc<CollectingNotificationSink>, BosOrchestrator) {
    let store = Arc::new(InMemoryProjectStore::with_project(
        project_uuid,
        ProjectRecord::from_value(fields),
    ));
    let sink = Arc::new(CollectingNotificationSink::new());
    let catalog = Arc::new(BosCatalog::bundled().unwrap());
    let population = AutoPopulationService::new(store.clone(), catalog);
    let extractor = EquipmentExtractor::new(Arc::new(StaticSpecLookup::new()));
    let orchestrator = BosOrchestrator::new(store.clone(), extractor, population)
        .with_notifier(OptionalNotificationSink::with_sink(sink.clone()));
    (store, sink, orchestrator)
}
