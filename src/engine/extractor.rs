// ==========================================
// 光伏 BOS 配置引擎 - 设备状态提取器
// ==========================================
// 职责: 项目扁平字段 → 每个系统的类型化设备描述
// 输入: ProjectRecord + 电力公司要求 + 规格查询
// 输出: SystemEquipment（无数据的系统返回 None）
// 红线: 规格查询失败只降级，不中断提取
// ==========================================

use crate::domain::equipment::{
    ExistingBos, ExistingBosEntry, SystemEquipment, UtilityRequirements,
};
use crate::domain::field::ProjectRecord;
use crate::domain::types::{
    BackupOption, BatteryChargingSource, CouplingType, InverterType, SpecialEquipment,
    SystemNumber, SystemType,
};
use crate::engine::spec_lookup::EquipmentSpecLookup;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 未指定电力公司时的名称
pub const UNKNOWN_UTILITY: &str = "Unknown";

// ==========================================
// EquipmentExtractor - 设备状态提取器
// ==========================================
pub struct EquipmentExtractor {
    lookup: Arc<dyn EquipmentSpecLookup>,
}

impl EquipmentExtractor {
    pub fn new(lookup: Arc<dyn EquipmentSpecLookup>) -> Self {
        Self { lookup }
    }

    /// 系统是否有可识别的设备数据
    ///
    /// 满足任一: 光伏组件 / 逆变器品牌型号 / 电池（品牌或型号且数量>0）/ selectedsystem
    pub fn system_has_data(record: &ProjectRecord, system: SystemNumber) -> bool {
        let p = system.prefix();
        let f = |suffix: &str| format!("{}{}", p, suffix);

        let has_solar = record.is_present(&f("solar_panel_make"))
            || record.is_present(&f("solar_panel_model"))
            || record.is_present(&f("solar_panel_qty"));
        let has_inverter = record.is_present(&f("micro_inverter_make"))
            || record.is_present(&f("micro_inverter_model"));
        let has_battery = (record.is_present(&f("battery_1_make"))
            || record.is_present(&f("battery_1_model")))
            && record.count(&f("battery_1_qty")) > 0;
        let has_system_type = record.is_present(&f("selectedsystem"));

        has_solar || has_inverter || has_battery || has_system_type
    }

    /// 提取单个系统
    ///
    /// # 参数
    /// - record: 项目字段
    /// - system: 系统编号
    /// - utility: 电力公司 BOS 要求（可选）
    ///
    /// # 返回
    /// - None: 该系统无设备数据
    #[instrument(skip(self, record, utility), fields(system = %system))]
    pub async fn extract(
        &self,
        record: &ProjectRecord,
        system: SystemNumber,
        utility: Option<&UtilityRequirements>,
    ) -> Option<SystemEquipment> {
        if !Self::system_has_data(record, system) {
            debug!("系统无设备数据，跳过");
            return None;
        }

        let p = system.prefix();
        let f = |suffix: &str| format!("{}{}", p, suffix);
        let text = |suffix: &str| record.text(&f(suffix)).map(str::to_string);

        let utility_name = utility
            .map(|u| u.utility_name.clone())
            .filter(|n| !n.trim().is_empty())
            .or_else(|| record.text("utility_name").map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_UTILITY.to_string());

        let mut eq = SystemEquipment::empty(system, utility_name);
        eq.utility_requirements = utility.cloned();

        // ===== 光伏组件 =====
        eq.solar_make = text("solar_panel_make");
        eq.solar_model = text("solar_panel_model");
        eq.solar_quantity = record.count(&f("solar_panel_qty"));
        eq.solar_wattage = record.number(&f("solar_panel_wattage"));
        eq.has_solar_panels =
            eq.solar_make.is_some() || eq.solar_model.is_some() || record.is_present(&f("solar_panel_qty"));

        // ===== 逆变器（微逆与组串共用 micro_inverter_* 字段）=====
        eq.system_type = record.text(&f("selectedsystem")).and_then(SystemType::from_field);
        eq.inverter_make = text("micro_inverter_make");
        eq.inverter_model = text("micro_inverter_model");
        eq.inverter_quantity = record.count(&f("micro_inverter_qty"));
        eq.inverter_is_new = record.flag(&f("inverter_existing")) != Some(true);
        eq.micro_inverter_is_new = record.flag(&f("micro_inverter_existing")) != Some(true);
        eq.inverter_type =
            InverterType::classify(eq.inverter_make.as_deref(), eq.inverter_model.as_deref());

        // ===== 电池 =====
        eq.battery_quantity = record.count(&f("battery_1_qty"));
        eq.battery_make = text("battery_1_make");
        eq.battery_model = text("battery_1_model");
        eq.battery_max_output_amps = record.number(&f("battery_1_max_continuous_output"));
        eq.battery2_quantity = record.count(&f("battery_2_qty"));
        eq.battery2_make = text("battery_2_make");
        eq.battery2_model = text("battery_2_model");
        eq.battery2_max_output_amps = record.number(&f("battery_2_max_continuous_output"));
        eq.battery_charging_source = BatteryChargingSource::resolve(
            eq.has_solar_panels,
            record.text(&f("battery_charging_source")),
        );

        // ===== SMS / 网关 =====
        let not_placeholder = |v: &Option<String>, placeholder: &str| {
            v.as_deref()
                .map(|s| !s.eq_ignore_ascii_case(placeholder))
                .unwrap_or(false)
        };
        eq.sms_make = text("sms_make");
        eq.sms_model = text("sms_model");
        eq.has_sms = (eq.sms_make.is_some() || eq.sms_model.is_some())
            && !(eq.sms_make.as_deref().map(|s| s.eq_ignore_ascii_case("no sms")).unwrap_or(false)
                || eq.sms_model.as_deref().map(|s| s.eq_ignore_ascii_case("no sms")).unwrap_or(false));
        if !eq.has_sms {
            eq.sms_make = None;
            eq.sms_model = None;
        }

        let gateway_make = text("gateway_make");
        let gateway_model = text("gateway_model");
        let gateway_named = (gateway_make.is_some() || gateway_model.is_some())
            && (gateway_make.is_none() || not_placeholder(&gateway_make, "no gateway"))
            && (gateway_model.is_none() || not_placeholder(&gateway_model, "no gateway"));
        eq.has_gateway = gateway_named || record.is_present(&f("gateway"));

        // ===== 备电 =====
        eq.backup_option = BackupOption::from_field(record.text(&f("backup_option")));
        let (panel_make_key, panel_model_key, bus_key) = Self::backup_panel_keys(system);
        let has_panel = record.is_present(&panel_make_key) || record.is_present(&panel_model_key);
        eq.has_backup_panel = eq.backup_option.has_backup() && has_panel;
        eq.backup_panel_bus_rating = record
            .number(&bus_key)
            .filter(|v| *v > 0.0)
            .map(|v| v.floor() as u32);
        eq.utility_service_amps = record
            .number("utility_service_amps")
            .filter(|v| *v > 0.0)
            .map(|v| v.floor() as u32);

        // ===== 规格查询 =====
        eq.coupling_type = self.resolve_coupling(&eq).await;
        eq.inverter_max_output_amps = match record.number(&f("inv_max_continuous_output")) {
            Some(v) if v > 0.0 => Some(v),
            _ => self.resolve_inverter_output(&eq).await,
        };

        // ===== 派生标记 =====
        eq.has_multiple_batteries = eq.battery_quantity > 1;
        eq.has_different_battery_types = eq.battery2_quantity > 0;
        eq.is_standby_only = !eq.has_solar_panels
            && eq.battery_charging_source == BatteryChargingSource::GridOnly;
        eq.requires_backup_power = eq.has_backup_panel && eq.backup_option.has_backup();
        eq.supports_peak_shaving = eq.inverter_type == Some(InverterType::Hybrid);
        eq.special_equipment = SpecialEquipment::classify_sms(eq.sms_model.as_deref()).or_else(|| {
            SpecialEquipment::classify_inverter(eq.inverter_make.as_deref(), eq.inverter_model.as_deref())
        });

        eq.existing_bos = Self::extract_existing_bos(record, system);

        debug!(
            utility = %eq.utility_name,
            system_type = ?eq.system_type,
            inverter_type = ?eq.inverter_type,
            coupling = %eq.coupling_type,
            inverter_output = ?eq.inverter_max_output_amps,
            batteries = eq.battery_quantity,
            has_sms = eq.has_sms,
            backup = %eq.backup_option,
            "设备状态提取完成"
        );

        Some(eq)
    }

    /// 并发提取全部系统（按编号升序，跳过无数据系统）
    pub async fn extract_all(
        &self,
        record: &ProjectRecord,
        utility: Option<&UtilityRequirements>,
    ) -> Vec<SystemEquipment> {
        let futures = SystemNumber::ALL
            .iter()
            .map(|system| self.extract(record, *system, utility));
        join_all(futures).await.into_iter().flatten().collect()
    }

    /// 备电子面板字段名（系统 1 使用 bls1_ 前缀）
    fn backup_panel_keys(system: SystemNumber) -> (String, String, String) {
        if system == SystemNumber::ONE {
            (
                "bls1_backup_load_sub_panel_make".to_string(),
                "bls1_backup_load_sub_panel_model".to_string(),
                "bls1_backuploader_bus_bar_rating".to_string(),
            )
        } else {
            let n = system.get();
            (
                format!("sys{}_backup_load_sub_panel_make", n),
                format!("sys{}_backup_load_sub_panel_model", n),
                format!("sys{}_backuploadsubpanel_bus_rating", n),
            )
        }
    }

    /// 耦合方式: 电池规格 couple_type 优先，否则混合逆变器为 DC，其余为 AC
    async fn resolve_coupling(&self, eq: &SystemEquipment) -> CouplingType {
        let inferred = if eq.inverter_type == Some(InverterType::Hybrid) {
            CouplingType::Dc
        } else {
            CouplingType::Ac
        };

        let (Some(make), Some(model)) = (eq.battery_make.as_deref(), eq.battery_model.as_deref())
        else {
            return inferred;
        };
        if eq.battery_quantity == 0 {
            return inferred;
        }

        match self.lookup.battery_coupling(make, model).await {
            Ok(Some(coupling)) => coupling,
            Ok(None) => {
                debug!(make, model, "电池规格无 couple_type，按逆变器类型推断");
                inferred
            }
            Err(e) => {
                warn!(make, model, error = %e, "电池规格查询失败，按逆变器类型推断");
                inferred
            }
        }
    }

    /// 逆变器最大持续输出: 微逆按数量累加
    async fn resolve_inverter_output(&self, eq: &SystemEquipment) -> Option<f64> {
        let (Some(make), Some(model)) = (eq.inverter_make.as_deref(), eq.inverter_model.as_deref())
        else {
            return None;
        };
        if eq.inverter_quantity == 0 {
            return None;
        }

        match self.lookup.inverter_output_amps(make, model).await {
            Ok(Some(per_unit)) => {
                let total = if eq.system_type == Some(SystemType::Microinverter) {
                    per_unit * eq.inverter_quantity as f64
                } else {
                    per_unit
                };
                Some(total)
            }
            Ok(None) => {
                debug!(make, model, "逆变器规格无最大输出");
                None
            }
            Err(e) => {
                warn!(make, model, error = %e, "逆变器规格查询失败");
                None
            }
        }
    }

    /// 已填写的 BOS 行
    ///
    /// - 汇流前: bos_sys{N}_type{1..6}_*
    /// - 电池侧: bos_sys{N}_battery1_type{1..3}_*
    /// - SMS 后: post_sms_bos_sys{N}_type{1..3}_*
    pub fn extract_existing_bos(record: &ProjectRecord, system: SystemNumber) -> ExistingBos {
        let n = system.get();
        let read = |prefix: String, count: u8| -> Vec<ExistingBosEntry> {
            (1..=count)
                .filter_map(|i| {
                    let base = format!("{}{}_", prefix, i);
                    let equipment_type = record.text(&format!("{}equipment_type", base))?;
                    Some(ExistingBosEntry {
                        position: i,
                        equipment_type: equipment_type.to_string(),
                        make: record.text(&format!("{}make", base)).map(str::to_string),
                        model: record.text(&format!("{}model", base)).map(str::to_string),
                        amp_rating: record.text_lossy(&format!("{}amp_rating", base)),
                    })
                })
                .collect()
        };

        ExistingBos {
            utility: read(format!("bos_sys{}_type", n), 6),
            battery: read(format!("bos_sys{}_battery1_type", n), 3),
            post_sms: read(format!("post_sms_bos_sys{}_type", n), 3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spec_lookup::StaticSpecLookup;
    use serde_json::json;

    fn extractor() -> EquipmentExtractor {
        let lookup = StaticSpecLookup::new()
            .with_inverter("Enphase", "IQ8PLUS-72-2-US", 1.21)
            .with_battery("SolarEdge", "Energy Bank", CouplingType::Dc);
        EquipmentExtractor::new(Arc::new(lookup))
    }

    #[tokio::test]
    async fn test_system_without_data_is_skipped() {
        let record = ProjectRecord::from_value(json!({
            "sys2_solar_panel_make": "",
            "sys2_battery_1_make": "Tesla",
            "sys2_battery_1_qty": 0,
        }));
        assert!(extractor().extract(&record, SystemNumber::TWO, None).await.is_none());
    }

    #[tokio::test]
    async fn test_microinverter_output_multiplies_quantity() {
        let record = ProjectRecord::from_value(json!({
            "utility_name": "APS",
            "sys1_solar_panel_make": "REC",
            "sys1_solar_panel_qty": "20",
            "sys1_selectedsystem": "microinverter",
            "sys1_micro_inverter_make": "Enphase",
            "sys1_micro_inverter_model": "IQ8PLUS-72-2-US",
            "sys1_micro_inverter_qty": 20,
            "sys1_micro_inverter_existing": false,
        }));

        let eq = extractor().extract(&record, SystemNumber::ONE, None).await.unwrap();
        assert_eq!(eq.utility_name, "APS");
        assert_eq!(eq.system_type, Some(SystemType::Microinverter));
        assert!((eq.inverter_max_output_amps.unwrap() - 24.2).abs() < 1e-9);
        assert!(eq.is_new_inverter());
        assert!(eq.is_pv_only());
        assert_eq!(eq.coupling_type, CouplingType::Ac);
    }

    #[tokio::test]
    async fn test_record_output_overrides_lookup_and_existing_flag() {
        let record = ProjectRecord::from_value(json!({
            "sys2_solar_panel_qty": 10,
            "sys2_selectedsystem": "inverter",
            "sys2_micro_inverter_make": "Enphase",
            "sys2_micro_inverter_model": "IQ8PLUS-72-2-US",
            "sys2_micro_inverter_qty": 1,
            "sys2_inverter_existing": "true",
            "sys2_inv_max_continuous_output": "30",
        }));

        let eq = extractor().extract(&record, SystemNumber::TWO, None).await.unwrap();
        assert_eq!(eq.inverter_max_output_amps, Some(30.0));
        assert!(!eq.is_new_inverter());
        assert_eq!(eq.utility_name, UNKNOWN_UTILITY);
    }

    #[tokio::test]
    async fn test_sms_gateway_and_backup_panel() {
        let record = ProjectRecord::from_value(json!({
            "sys1_solar_panel_make": "REC",
            "sys1_micro_inverter_make": "SolarEdge",
            "sys1_micro_inverter_model": "SE7600H-US HD-Wave",
            "sys1_micro_inverter_qty": 1,
            "sys1_battery_1_make": "SolarEdge",
            "sys1_battery_1_model": "Energy Bank",
            "sys1_battery_1_qty": 1,
            "sys1_sms_make": "No SMS",
            "sys1_gateway_make": "No Gateway",
            "sys1_backup_option": "Whole Home",
            "bls1_backup_load_sub_panel_make": "Square D",
            "bls1_backuploader_bus_bar_rating": "125",
        }));

        let eq = extractor().extract(&record, SystemNumber::ONE, None).await.unwrap();
        assert!(!eq.has_sms);
        assert!(!eq.has_gateway);
        assert!(eq.has_backup_panel);
        assert_eq!(eq.backup_panel_bus_rating, Some(125));
        assert_eq!(eq.inverter_type, Some(InverterType::Hybrid));
        assert_eq!(eq.coupling_type, CouplingType::Dc);
        assert!(eq.supports_peak_shaving);
    }

    #[tokio::test]
    async fn test_extract_all_skips_empty_systems() {
        let record = ProjectRecord::from_value(json!({
            "sys1_solar_panel_qty": 10,
            "sys3_selectedsystem": "batteryonly",
        }));

        let systems = extractor().extract_all(&record, None).await;
        let numbers: Vec<u8> = systems.iter().map(|s| s.system.get()).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_existing_bos_rows() {
        let record = ProjectRecord::from_value(json!({
            "bos_sys1_type1_equipment_type": "Utility Disconnect",
            "bos_sys1_type1_amp_rating": 30,
            "bos_sys1_type3_equipment_type": "Uni-Directional Meter",
            "post_sms_bos_sys1_type2_equipment_type": "Utility Disconnect",
        }));

        let bos = EquipmentExtractor::extract_existing_bos(&record, SystemNumber::ONE);
        assert_eq!(bos.utility.len(), 2);
        assert_eq!(bos.utility[0].amp_rating.as_deref(), Some("30"));
        assert_eq!(bos.utility[1].position, 3);
        assert_eq!(bos.post_sms.len(), 1);
        assert!(bos.battery.is_empty());
    }
}
