// ==========================================
// 光伏 BOS 配置引擎 - 系统设备描述
// ==========================================
// 职责: 单个系统的设备状态快照（提取器输出，匹配器输入）
// 说明: 只包含已解析的类型化字段，不保留原始字符串字段
// ==========================================

use crate::domain::types::{
    BackupOption, BatteryChargingSource, CouplingType, InverterType, SpecialEquipment,
    SystemNumber, SystemType,
};
use serde::{Deserialize, Serialize};

// ==========================================
// UtilityRequirements - 电力公司 BOS 要求
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilityRequirements {
    pub utility_name: String,
    pub state: Option<String>,
    pub combination: Option<String>,
    /// bos_1 .. bos_6（按位置顺序，缺失位置为 None）
    pub bos_types: [Option<String>; 6],
}

impl UtilityRequirements {
    /// 已声明的 BOS 要求（位置, 设备类型）
    pub fn required_types(&self) -> impl Iterator<Item = (u8, &str)> {
        self.bos_types
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_deref().map(|t| (i as u8 + 1, t)))
    }
}

// ==========================================
// ExistingBos - 已填写的 BOS 行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingBosEntry {
    pub position: u8,
    pub equipment_type: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub amp_rating: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExistingBos {
    pub utility: Vec<ExistingBosEntry>,
    pub battery: Vec<ExistingBosEntry>,
    pub post_sms: Vec<ExistingBosEntry>,
}

impl ExistingBos {
    pub fn is_empty(&self) -> bool {
        self.utility.is_empty() && self.battery.is_empty() && self.post_sms.is_empty()
    }
}

// ==========================================
// SystemEquipment - 系统设备描述
// ==========================================

/// 单个系统的设备描述
///
/// # 说明
/// - 逆变器品牌/型号统一来自 sys{N}_micro_inverter_* 字段（微逆与组串逆变器共用）
/// - 输出电流单位为 A，未知时为 None
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEquipment {
    pub system: SystemNumber,

    // ===== 电力公司 =====
    pub utility_name: String,
    pub utility_requirements: Option<UtilityRequirements>,

    // ===== 光伏组件 =====
    pub has_solar_panels: bool,
    pub solar_make: Option<String>,
    pub solar_model: Option<String>,
    pub solar_quantity: u32,
    pub solar_wattage: Option<f64>,

    // ===== 逆变器 =====
    pub system_type: Option<SystemType>,
    pub inverter_make: Option<String>,
    pub inverter_model: Option<String>,
    pub inverter_quantity: u32,
    pub inverter_type: Option<InverterType>,
    pub inverter_max_output_amps: Option<f64>,
    pub inverter_is_new: bool,
    pub micro_inverter_is_new: bool,

    // ===== 电池 =====
    pub battery_quantity: u32,
    pub battery_make: Option<String>,
    pub battery_model: Option<String>,
    pub battery_max_output_amps: Option<f64>,
    pub battery2_quantity: u32,
    pub battery2_make: Option<String>,
    pub battery2_model: Option<String>,
    pub battery2_max_output_amps: Option<f64>,
    pub battery_charging_source: BatteryChargingSource,
    pub coupling_type: CouplingType,

    // ===== SMS / 网关 =====
    pub has_sms: bool,
    pub sms_make: Option<String>,
    pub sms_model: Option<String>,
    pub has_gateway: bool,

    // ===== 备电 =====
    pub backup_option: BackupOption,
    pub has_backup_panel: bool,
    pub backup_panel_bus_rating: Option<u32>,
    pub utility_service_amps: Option<u32>,

    // ===== 派生标记 =====
    pub has_multiple_batteries: bool,
    pub has_different_battery_types: bool,
    pub is_standby_only: bool,
    pub requires_backup_power: bool,
    pub supports_peak_shaving: bool,
    pub special_equipment: Option<SpecialEquipment>,

    pub existing_bos: ExistingBos,
}

impl SystemEquipment {
    /// 创建空描述（所有设备缺失）
    pub fn empty(system: SystemNumber, utility_name: impl Into<String>) -> Self {
        Self {
            system,
            utility_name: utility_name.into(),
            utility_requirements: None,
            has_solar_panels: false,
            solar_make: None,
            solar_model: None,
            solar_quantity: 0,
            solar_wattage: None,
            system_type: None,
            inverter_make: None,
            inverter_model: None,
            inverter_quantity: 0,
            inverter_type: None,
            inverter_max_output_amps: None,
            inverter_is_new: true,
            micro_inverter_is_new: true,
            battery_quantity: 0,
            battery_make: None,
            battery_model: None,
            battery_max_output_amps: None,
            battery2_quantity: 0,
            battery2_make: None,
            battery2_model: None,
            battery2_max_output_amps: None,
            battery_charging_source: BatteryChargingSource::GridOnly,
            coupling_type: CouplingType::Ac,
            has_sms: false,
            sms_make: None,
            sms_model: None,
            has_gateway: false,
            backup_option: BackupOption::NoBackup,
            has_backup_panel: false,
            backup_panel_bus_rating: None,
            utility_service_amps: None,
            has_multiple_batteries: false,
            has_different_battery_types: false,
            is_standby_only: false,
            requires_backup_power: false,
            supports_peak_shaving: false,
            special_equipment: None,
            existing_bos: ExistingBos::default(),
        }
    }

    /// 逆变器是否为新装
    ///
    /// 微逆系统看 micro_inverter_existing，其余看 inverter_existing
    pub fn is_new_inverter(&self) -> bool {
        match self.system_type {
            Some(SystemType::Microinverter) => self.micro_inverter_is_new,
            _ => self.inverter_is_new,
        }
    }

    pub fn has_inverter(&self) -> bool {
        self.inverter_make.is_some() || self.inverter_model.is_some()
    }

    pub fn has_battery(&self) -> bool {
        self.battery_quantity > 0
    }

    /// 纯光伏（无电池、无 SMS、无备电）
    pub fn is_pv_only(&self) -> bool {
        self.has_solar_panels
            && self.battery_quantity == 0
            && self.battery2_quantity == 0
            && !self.has_sms
            && !self.backup_option.has_backup()
    }

    /// 电池总输出（A）
    pub fn battery_output_amps(&self) -> f64 {
        self.battery_max_output_amps.unwrap_or(0.0) + self.battery2_max_output_amps.unwrap_or(0.0)
    }

    /// 系统总输出: 逆变器 + 电池1 + 电池2（A）
    pub fn total_output_amps(&self) -> f64 {
        self.inverter_max_output_amps.unwrap_or(0.0) + self.battery_output_amps()
    }

    pub fn utility_is(&self, name: &str) -> bool {
        self.utility_name.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_new_inverter_follows_system_type() {
        let mut eq = SystemEquipment::empty(SystemNumber::ONE, "APS");
        eq.system_type = Some(SystemType::Microinverter);
        eq.inverter_is_new = true;
        eq.micro_inverter_is_new = false;
        assert!(!eq.is_new_inverter());

        eq.system_type = Some(SystemType::Inverter);
        assert!(eq.is_new_inverter());
    }

    #[test]
    fn test_total_output() {
        let mut eq = SystemEquipment::empty(SystemNumber::TWO, "APS");
        eq.inverter_max_output_amps = Some(20.0);
        eq.battery_max_output_amps = Some(10.0);
        eq.battery2_max_output_amps = Some(5.5);
        assert_eq!(eq.total_output_amps(), 35.5);
    }

    #[test]
    fn test_required_types_skips_gaps() {
        let req = UtilityRequirements {
            utility_name: "APS".to_string(),
            bos_types: [
                Some("PV Meter".to_string()),
                None,
                Some("Fused AC Disconnect".to_string()),
                None,
                None,
                None,
            ],
            ..Default::default()
        };
        let types: Vec<_> = req.required_types().collect();
        assert_eq!(types, vec![(1, "PV Meter"), (3, "Fused AC Disconnect")]);
    }
}
