// ==========================================
// 光伏 BOS 配置引擎 - BOS 自动填充
// ==========================================
// 职责: 按匹配结果选型、生成字段载荷、按系统独立写入、回读项目字段
// 红线: 已有非空字段绝不覆盖（重复运行幂等）
// 红线: 单个系统写入失败不影响其他系统，失败按系统归档
// 红线: 持久化额定电流始终为派生值，目录只提供品牌/型号
// ==========================================

use crate::domain::bos::{BosEquipmentItem, ConfigurationMatch, MultiSystemConfig};
use crate::domain::catalog::PreferredEquipment;
use crate::domain::field::{FieldPayload, ProjectRecord};
use crate::domain::types::{BosSection, PostCombineType, SystemNumber};
use crate::engine::bos_catalog::{BosCatalog, CatalogSelection};
use crate::engine::error::{BosError, BosResult};
use crate::engine::slot_allocator::{post_combine_prefix, SlotAllocation};
use crate::repository::{PreferredEquipmentRepository, ProjectStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 落点映射
// ==========================================
const LANDING_VALUES: [(&str, &str); 4] = [
    ("Sol-Ark", "solArk"),
    ("Main Panel A", "meterA"),
    ("Main Panel B", "meterB"),
    ("Sub Panel B", "subPanelB"),
];

/// 落点名称 → 持久化值（未知名称原样保存）
pub fn landing_value(combines_at: &str) -> &str {
    LANDING_VALUES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(combines_at))
        .map(|(_, value)| *value)
        .unwrap_or(combines_at)
}

pub fn landing_field(system: SystemNumber) -> String {
    format!("systemLandingSys{}", system)
}

// ==========================================
// AutoPopulationOptions - 填充选项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPopulationOptions {
    /// 目录可唯一确定时自动选择品牌/型号
    pub auto_select_when_possible: bool,
    /// 跳过已填写的槽位与字段
    pub skip_existing: bool,
    /// 公司 UUID（读取偏好设备）
    pub company_uuid: Option<String>,
    /// 写入后回读前的等待时间
    pub refresh_delay_ms: u64,
}

impl Default for AutoPopulationOptions {
    fn default() -> Self {
        Self {
            auto_select_when_possible: true,
            skip_existing: true,
            company_uuid: None,
            refresh_delay_ms: 0,
        }
    }
}

// ==========================================
// 填充结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub equipment_type: String,
    pub field_prefix: String,
    pub reason: String,
}

/// 单个系统的填充报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPopulationReport {
    pub system: SystemNumber,
    pub config_ids: Vec<String>,
    pub added: Vec<BosEquipmentItem>,
    pub requires_user_selection: Vec<BosEquipmentItem>,
    pub skipped: Vec<SkippedItem>,
    /// 已有值而未写入的字段
    pub skipped_fields: Vec<String>,
    pub fields_written: usize,
    pub errors: Vec<String>,
    pub success: bool,
}

impl SystemPopulationReport {
    fn new(system: SystemNumber) -> Self {
        Self {
            system,
            config_ids: Vec::new(),
            added: Vec::new(),
            requires_user_selection: Vec::new(),
            skipped: Vec::new(),
            skipped_fields: Vec::new(),
            fields_written: 0,
            errors: Vec::new(),
            success: true,
        }
    }
}

/// 整体填充报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoPopulationReport {
    /// 本次运行 ID（日志关联）
    pub run_id: String,
    pub project_uuid: String,
    pub systems: Vec<SystemPopulationReport>,
    /// 写入后回读的项目字段
    pub refreshed: ProjectRecord,
}

impl AutoPopulationReport {
    pub fn added_count(&self) -> usize {
        self.systems.iter().map(|s| s.added.len() + s.requires_user_selection.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.systems.iter().map(|s| s.skipped.len()).sum()
    }

    pub fn requires_selection_count(&self) -> usize {
        self.systems.iter().map(|s| s.requires_user_selection.len()).sum()
    }

    pub fn failed_systems(&self) -> Vec<SystemNumber> {
        self.systems.iter().filter(|s| !s.success).map(|s| s.system).collect()
    }

    pub fn is_success(&self) -> bool {
        self.systems.iter().all(|s| s.success)
    }
}

// ==========================================
// AutoPopulationGuard - 防重入
// ==========================================
#[derive(Debug, Default)]
pub struct AutoPopulationGuard {
    running: AtomicBool,
}

/// 持有期间阻止新的填充；Drop 时释放
pub struct GuardToken<'a> {
    guard: &'a AutoPopulationGuard,
}

impl AutoPopulationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> BosResult<GuardToken<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BosError::OperationInProgress)?;
        Ok(GuardToken { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

// ==========================================
// 字段布局
// ==========================================

/// 区块字段前缀（含末尾下划线）
///
/// # 返回
/// - Err(SlotUnavailable): Combine 设备请求 Type 3 而系统汇流箱已占用槽位 1
pub fn field_prefix(item: &BosEquipmentItem, allocation: &SlotAllocation) -> BosResult<String> {
    let n = item.system;
    let p = item.position;
    Ok(match item.section {
        BosSection::Utility => format!("bos_sys{}_type{}_", n, p),
        BosSection::Battery => format!("bos_sys{}_battery1_type{}_", n, p),
        BosSection::Backup => format!("bos_sys{}_backup_type{}_", n, p),
        BosSection::PostSms => format!("post_sms_bos_sys{}_type{}_", n, p),
        BosSection::Combine => {
            let kind = PostCombineType::from_index(p).ok_or_else(|| {
                BosError::Other(anyhow::anyhow!("无效的 Post Combine 类型序号: {}", p))
            })?;
            post_combine_prefix(allocation.slot_for(kind)?)
        }
    })
}

fn trigger_value(section: BosSection, system: SystemNumber) -> Option<String> {
    match section {
        BosSection::Utility => Some(format!("sys{}_stringCombiner", system)),
        BosSection::Battery => Some(format!("sys{}_battery1", system)),
        BosSection::Backup => Some(format!("sys{}_backup", system)),
        BosSection::PostSms => Some(format!("sys{}_postSMS", system)),
        BosSection::Combine => None,
    }
}

fn block_name(section: BosSection) -> &'static str {
    match section {
        BosSection::Utility => "PRE COMBINE",
        BosSection::Battery | BosSection::Backup => "ESS",
        BosSection::PostSms | BosSection::Combine => "POST COMBINE",
    }
}

/// 单个设备的字段载荷
pub fn item_payload(item: &BosEquipmentItem, prefix: &str) -> FieldPayload {
    let key = |suffix: &str| format!("{}{}", prefix, suffix);
    let mut payload = FieldPayload::new();
    payload
        .set(key("equipment_type"), item.equipment_type.clone())
        .set_opt(key("make"), item.make.clone())
        .set_opt(key("model"), item.model.clone())
        .set_opt(key("amp_rating"), item.amp_rating.map(|a| a.to_string()))
        .set(key("block_name"), block_name(item.section));

    match item.section {
        BosSection::Combine => {
            payload.set(key("existing"), !item.is_new).set(key("active"), true);
        }
        section => {
            payload.set(key("is_new"), item.is_new);
            if let Some(trigger) = trigger_value(section, item.system) {
                payload.set(key("trigger"), trigger);
            }
            if section != BosSection::Battery {
                payload.set(key("active"), true);
            }
        }
    }
    payload
}

/// 多系统落点字段
pub fn landing_payload(config: &MultiSystemConfig) -> BTreeMap<SystemNumber, FieldPayload> {
    let mut out: BTreeMap<SystemNumber, FieldPayload> = BTreeMap::new();
    for landing in &config.landings {
        out.entry(landing.system)
            .or_default()
            .set(landing_field(landing.system), landing_value(&landing.combines_at));
    }
    out
}

/// SMS / 网关类设备
fn is_core_equipment_type(equipment_type: &str) -> bool {
    let t = equipment_type.to_ascii_lowercase();
    t.contains("gateway") || t == "sms" || t.contains("storage management")
}

/// 槽位是否已有设备
fn slot_occupied(record: &ProjectRecord, prefix: &str) -> bool {
    ["equipment_type", "make", "model"]
        .iter()
        .any(|s| record.is_present(&format!("{}{}", prefix, s)))
}

fn system_has_sms(record: &ProjectRecord, system: SystemNumber) -> bool {
    let f = |s: &str| format!("{}{}", system.prefix(), s);
    record.is_present(&f("sms_make")) || record.is_present(&f("sms_model"))
}

// ==========================================
// 必需设备校验
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredEquipmentCheck {
    pub valid: bool,
    pub missing_equipment: Vec<String>,
}

/// 填充前校验配置要求的核心设备仍然存在
pub fn validate_required_equipment(
    m: &ConfigurationMatch,
    record: &ProjectRecord,
) -> RequiredEquipmentCheck {
    let f = |s: &str| format!("{}{}", m.system.prefix(), s);
    let any = |keys: &[&str]| keys.iter().any(|k| record.is_present(&f(k)));
    let req = &m.required_equipment;

    let mut missing = Vec::new();
    if req.solar_panels && !any(&["solar_panel_make", "solar_panel_model"]) {
        missing.push("Solar Panels".to_string());
    }
    if req.battery_quantity > 0 && record.count(&f("battery_1_qty")) == 0 {
        missing.push("Battery".to_string());
    }
    if !req.inverter_types.is_empty() && !any(&["micro_inverter_make", "micro_inverter_model"]) {
        missing.push("Inverter".to_string());
    }
    if req.sms && !any(&["sms_make", "sms_model"]) {
        missing.push("Storage Management System (SMS)".to_string());
    }

    RequiredEquipmentCheck {
        valid: missing.is_empty(),
        missing_equipment: missing,
    }
}

// ==========================================
// AutoPopulationService
// ==========================================
pub struct AutoPopulationService {
    store: Arc<dyn ProjectStore>,
    catalog: Arc<BosCatalog>,
    preferred_repo: Option<Arc<PreferredEquipmentRepository>>,
    guard: AutoPopulationGuard,
}

impl AutoPopulationService {
    pub fn new(store: Arc<dyn ProjectStore>, catalog: Arc<BosCatalog>) -> Self {
        Self {
            store,
            catalog,
            preferred_repo: None,
            guard: AutoPopulationGuard::new(),
        }
    }

    pub fn with_preferred_repo(mut self, repo: Arc<PreferredEquipmentRepository>) -> Self {
        self.preferred_repo = Some(repo);
        self
    }

    pub fn catalog(&self) -> &BosCatalog {
        &self.catalog
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// 自动填充 BOS
    ///
    /// # 参数
    /// - project_uuid: 项目 UUID
    /// - matches: 每个系统的最佳匹配（已应用合并规则）
    /// - options: 填充选项
    ///
    /// # 返回
    /// - Ok: 各系统报告与回读后的项目字段（单系统失败记录在报告中）
    /// - Err(OperationInProgress): 已有填充正在执行
    /// - Err(Repository): 读取项目字段失败
    ///
    /// # 说明
    /// 同一 config_id 的多系统配置只处理一次；设备按所属系统分组写入
    #[instrument(skip(self, matches, options), fields(matches = matches.len()))]
    pub async fn auto_populate(
        &self,
        project_uuid: &str,
        matches: &[ConfigurationMatch],
        options: &AutoPopulationOptions,
    ) -> BosResult<AutoPopulationReport> {
        let _token = self.guard.try_acquire()?;
        let run_id = Uuid::new_v4().to_string();
        debug!(%run_id, "开始 BOS 自动填充");

        let record = self.store.fetch_project_fields(project_uuid).await?;
        let allocation = SlotAllocation::from_record(&record);
        let preferred = self.load_preferred(options.company_uuid.as_deref());

        let mut seen_multi: BTreeSet<&str> = BTreeSet::new();
        let unique: Vec<&ConfigurationMatch> = matches
            .iter()
            .filter(|m| !m.is_multi_system() || seen_multi.insert(m.config_id.as_str()))
            .collect();

        let mut reports: BTreeMap<SystemNumber, SystemPopulationReport> = BTreeMap::new();
        let mut payloads: BTreeMap<SystemNumber, FieldPayload> = BTreeMap::new();

        for m in &unique {
            let check = validate_required_equipment(m, &record);
            if !check.valid {
                warn!(
                    config_id = %m.config_id,
                    missing = ?check.missing_equipment,
                    "配置所需设备缺失，仍按匹配结果填充"
                );
            }

            for item in &m.bos_equipment {
                let report = reports
                    .entry(item.system)
                    .or_insert_with(|| SystemPopulationReport::new(item.system));
                if !report.config_ids.contains(&m.config_id) {
                    report.config_ids.push(m.config_id.clone());
                }

                let prefix = match field_prefix(item, &allocation) {
                    Ok(prefix) => prefix,
                    Err(e) => {
                        warn!(equipment_type = %item.equipment_type, error = %e, "无法分配槽位");
                        report.errors.push(format!("{}: {}", item.equipment_type, e));
                        report.success = false;
                        continue;
                    }
                };

                if options.skip_existing {
                    if let Some(reason) = Self::skip_reason(&record, item, &prefix) {
                        debug!(field_prefix = %prefix, %reason, "跳过已有设备");
                        report.skipped.push(SkippedItem {
                            equipment_type: item.equipment_type.clone(),
                            field_prefix: prefix,
                            reason,
                        });
                        continue;
                    }
                }

                let resolved = self.resolve_item(item, &preferred, options, report);
                payloads
                    .entry(item.system)
                    .or_default()
                    .merge(item_payload(&resolved, &prefix));
                if resolved.requires_user_selection {
                    report.requires_user_selection.push(resolved);
                } else {
                    report.added.push(resolved);
                }
            }

            if let Some(config) = &m.multi_system {
                for (system, landing) in landing_payload(config) {
                    reports
                        .entry(system)
                        .or_insert_with(|| SystemPopulationReport::new(system));
                    payloads.entry(system).or_default().merge(landing);
                }
            }
        }

        for (system, mut payload) in payloads {
            let Some(report) = reports.get_mut(&system) else {
                continue;
            };
            if options.skip_existing {
                report.skipped_fields = payload.retain_missing_in(&record);
            }
            if payload.is_empty() {
                continue;
            }

            match self.store.save_project_fields(project_uuid, &payload).await {
                Ok(()) => {
                    report.fields_written = payload.len();
                    info!(system = %system, fields = payload.len(), "系统 BOS 字段已写入");
                }
                Err(e) => {
                    warn!(system = %system, error = %e, "系统 BOS 字段写入失败");
                    report.errors.push(e.to_string());
                    report.success = false;
                }
            }
        }

        if options.refresh_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.refresh_delay_ms)).await;
        }
        let refreshed = self.store.fetch_project_fields(project_uuid).await?;

        let report = AutoPopulationReport {
            run_id,
            project_uuid: project_uuid.to_string(),
            systems: reports.into_values().collect(),
            refreshed,
        };
        info!(
            run_id = %report.run_id,
            added = report.added_count(),
            skipped = report.skipped_count(),
            failed = report.failed_systems().len(),
            "BOS 自动填充完成"
        );
        Ok(report)
    }

    fn skip_reason(record: &ProjectRecord, item: &BosEquipmentItem, prefix: &str) -> Option<String> {
        if is_core_equipment_type(&item.equipment_type) && system_has_sms(record, item.system) {
            return Some(format!("系统 {} 已有 SMS/网关", item.system));
        }
        if slot_occupied(record, prefix) {
            return Some(format!("{} 已有设备", prefix.trim_end_matches('_')));
        }
        None
    }

    /// 目录选型
    fn resolve_item(
        &self,
        item: &BosEquipmentItem,
        preferred: &[PreferredEquipment],
        options: &AutoPopulationOptions,
        report: &mut SystemPopulationReport,
    ) -> BosEquipmentItem {
        let mut resolved = item.clone();
        if item.make.is_some() && item.model.is_some() {
            return resolved;
        }
        if !options.auto_select_when_possible {
            resolved.requires_user_selection = true;
            return resolved;
        }

        match self.catalog.select(
            &item.equipment_type,
            item.min_amp_rating,
            preferred,
            item.preferred_make.as_deref(),
        ) {
            CatalogSelection::Selected { make, model, .. } => {
                resolved.make = Some(make);
                resolved.model = Some(model);
            }
            CatalogSelection::RequiresSelection { available_makes, .. } => {
                debug!(
                    equipment_type = %item.equipment_type,
                    makes = ?available_makes,
                    "目录候选不唯一，需要用户选择"
                );
                resolved.requires_user_selection = true;
            }
            CatalogSelection::NotInCatalog { standard_type } => {
                warn!(system = %item.system, %standard_type, "设备类型不在目录中");
                report
                    .errors
                    .push(format!("{}: 设备目录中没有该类型", item.equipment_type));
                resolved.requires_user_selection = true;
            }
        }
        resolved
    }

    fn load_preferred(&self, company_uuid: Option<&str>) -> Vec<PreferredEquipment> {
        let (Some(repo), Some(company)) = (&self.preferred_repo, company_uuid) else {
            return Vec::new();
        };
        repo.list_by_company(company).unwrap_or_else(|e| {
            warn!(company_uuid = company, error = %e, "读取偏好设备失败，按无偏好处理");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bos::SystemLanding;
    use crate::domain::catalog::CatalogEntry;
    use crate::domain::types::Confidence;
    use crate::repository::InMemoryProjectStore;
    use serde_json::json;

    fn catalog() -> Arc<BosCatalog> {
        let entry = |t: &str, make: &str, model: &str, amp: u32| CatalogEntry {
            equipment_type: t.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            amp: Some(amp),
        };
        Arc::new(BosCatalog::from_entries(vec![
            entry("PV Meter", "Milbank", "U5929XL", 100),
            entry("Fused AC Disconnect", "Eaton", "DG221URB", 30),
            entry("Fused AC Disconnect", "Eaton", "DG222URB", 60),
            entry("Fused AC Disconnect", "Siemens", "GF222NR", 60),
        ]))
    }

    fn pv_match(system: SystemNumber) -> ConfigurationMatch {
        let mut m = ConfigurationMatch::new("APS_PV_ONLY_STRING_INVERTER", "PV", 3, Confidence::High, system);
        m.bos_equipment = vec![
            BosEquipmentItem::new(system, BosSection::Utility, 1, "Uni-Directional Meter").sized("x", "x", 25),
            BosEquipmentItem::new(system, BosSection::Utility, 2, "Utility Disconnect").sized("x", "x", 25),
        ];
        m
    }

    #[test]
    fn test_item_payload_layout() {
        let item = BosEquipmentItem::new(SystemNumber::TWO, BosSection::Backup, 1, "Uni-Directional Meter")
            .fixed("Milbank", "U5929XL", 200);
        let allocation = SlotAllocation::for_combiner(false);
        let prefix = field_prefix(&item, &allocation).unwrap();
        assert_eq!(prefix, "bos_sys2_backup_type1_");

        let payload = item_payload(&item, &prefix);
        assert_eq!(payload.get("bos_sys2_backup_type1_trigger"), Some(&json!("sys2_backup")));
        assert_eq!(payload.get("bos_sys2_backup_type1_block_name"), Some(&json!("ESS")));
        assert_eq!(payload.get("bos_sys2_backup_type1_amp_rating"), Some(&json!("200")));
        assert_eq!(payload.get("bos_sys2_backup_type1_is_new"), Some(&json!(true)));
        assert_eq!(payload.get("bos_sys2_backup_type1_active"), Some(&json!(true)));

        let battery = BosEquipmentItem::new(SystemNumber::ONE, BosSection::Battery, 1, "Battery Disconnect");
        let payload = item_payload(&battery, &field_prefix(&battery, &allocation).unwrap());
        assert!(!payload.contains_key("bos_sys1_battery1_type1_active"));
    }

    #[test]
    fn test_combine_item_uses_shifted_slot() {
        let meter = BosEquipmentItem::new(SystemNumber::ONE, BosSection::Combine, 1, "Uni-Directional Meter");
        let with_combiner = SlotAllocation::for_combiner(true);
        assert_eq!(field_prefix(&meter, &with_combiner).unwrap(), "post_sms_bos_sys1_type2_");

        let third = BosEquipmentItem::new(SystemNumber::ONE, BosSection::Combine, 3, "Utility Disconnect");
        assert!(matches!(
            field_prefix(&third, &with_combiner),
            Err(BosError::SlotUnavailable { .. })
        ));

        let payload = item_payload(&meter, "post_sms_bos_sys1_type2_");
        assert_eq!(payload.get("post_sms_bos_sys1_type2_existing"), Some(&json!(false)));
        assert!(!payload.contains_key("post_sms_bos_sys1_type2_trigger"));
    }

    #[test]
    fn test_landing_values() {
        let config = MultiSystemConfig {
            total_systems: 2,
            landings: vec![
                SystemLanding {
                    system: SystemNumber::ONE,
                    combines_at: "Tesla PowerWall 3".to_string(),
                },
                SystemLanding {
                    system: SystemNumber::TWO,
                    combines_at: "Main Panel A".to_string(),
                },
            ],
        };
        let payloads = landing_payload(&config);
        assert_eq!(
            payloads[&SystemNumber::ONE].get("systemLandingSys1"),
            Some(&json!("Tesla PowerWall 3"))
        );
        assert_eq!(payloads[&SystemNumber::TWO].get("systemLandingSys2"), Some(&json!("meterA")));
    }

    #[test]
    fn test_guard_rejects_overlap() {
        let guard = AutoPopulationGuard::new();
        let token = guard.try_acquire().unwrap();
        assert!(matches!(guard.try_acquire(), Err(BosError::OperationInProgress)));
        drop(token);
        assert!(guard.try_acquire().is_ok());
    }

    #[test]
    fn test_validate_required_equipment() {
        let mut m = pv_match(SystemNumber::ONE);
        m.required_equipment.solar_panels = true;
        m.required_equipment.sms = true;
        let record = ProjectRecord::from_value(json!({ "sys1_solar_panel_make": "REC" }));
        let check = validate_required_equipment(&m, &record);
        assert!(!check.valid);
        assert_eq!(check.missing_equipment, vec!["Storage Management System (SMS)"]);
    }

    #[tokio::test]
    async fn test_populate_selects_from_catalog() {
        let store = Arc::new(InMemoryProjectStore::new());
        let service = AutoPopulationService::new(store.clone(), catalog());

        let report = service
            .auto_populate("p1", &[pv_match(SystemNumber::ONE)], &AutoPopulationOptions::default())
            .await
            .unwrap();

        assert!(report.is_success());
        let r = &report.refreshed;
        assert_eq!(r.text("bos_sys1_type1_make"), Some("Milbank"));
        // 最小满足 25A 的等级为 30A，唯一候选
        assert_eq!(r.text("bos_sys1_type2_model"), Some("DG221URB"));
        assert_eq!(r.text("bos_sys1_type2_amp_rating"), Some("25"));
        assert_eq!(r.text("bos_sys1_type1_trigger"), Some("sys1_stringCombiner"));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn test_populate_twice_is_idempotent() {
        let record = ProjectRecord::from_value(json!({
            "bos_sys1_type1_equipment_type": "User Meter",
            "bos_sys1_type1_make": "Custom",
        }));
        let store = Arc::new(InMemoryProjectStore::with_project("p1", record));
        let service = AutoPopulationService::new(store.clone(), catalog());
        let matches = [pv_match(SystemNumber::ONE)];
        let options = AutoPopulationOptions::default();

        let first = service.auto_populate("p1", &matches, &options).await.unwrap();
        assert_eq!(first.skipped_count(), 1);
        assert_eq!(first.refreshed.text("bos_sys1_type1_make"), Some("Custom"));

        let second = service.auto_populate("p1", &matches, &options).await.unwrap();
        assert_eq!(second.skipped_count(), 2);
        assert_eq!(second.refreshed, first.refreshed);
        assert_eq!(store.save_calls(), 1);
    }
}
