// ==========================================
// 光伏 BOS 配置引擎 - 配置检测器
// ==========================================
// 职责: 按电力公司规则识别系统配置，生成 BOS 设备清单
// 输入: DetectionContext（当前系统 + 同项目其它系统）
// 输出: ConfigurationMatch（不满足条件返回 None）
// 红线: 检测器为纯函数，不访问存储
// ==========================================

mod aps_generic;
mod dc_coupled;
mod pv_only;
mod tesla_pw3;
mod utility_requirements;

pub use aps_generic::{aps_generic_detectors, ApsGenericDetector};
pub use dc_coupled::DcCoupledDetector;
pub use pv_only::PvOnlyDetector;
pub use tesla_pw3::{TeslaPw3MultiSystemDetector, TeslaPw3SingleSystemDetector};
pub use utility_requirements::UtilityRequirementsDetector;

use crate::domain::bos::{BosEquipmentItem, ConfigurationMatch};
use crate::domain::equipment::SystemEquipment;
use crate::domain::types::{BosSection, SystemNumber};
use crate::engine::sizing;
use std::sync::Arc;

/// 适用全部电力公司
pub const ANY_UTILITY: &str = "*";

// ==========================================
// DetectionContext - 检测上下文
// ==========================================

/// 检测上下文
///
/// 多系统检测器通过 `sibling` 读取同项目的其它系统，无需重新拉取项目字段
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub equipment: &'a SystemEquipment,
    pub systems: &'a [SystemEquipment],
}

impl<'a> DetectionContext<'a> {
    pub fn new(equipment: &'a SystemEquipment, systems: &'a [SystemEquipment]) -> Self {
        Self { equipment, systems }
    }

    /// 单系统上下文（无兄弟系统）
    pub fn single(equipment: &'a SystemEquipment) -> Self {
        Self {
            equipment,
            systems: std::slice::from_ref(equipment),
        }
    }

    pub fn system(&self) -> SystemNumber {
        self.equipment.system
    }

    pub fn sibling(&self, system: SystemNumber) -> Option<&'a SystemEquipment> {
        self.systems.iter().find(|s| s.system == system)
    }
}

// ==========================================
// ConfigurationDetector Trait
// ==========================================

/// 配置检测器 Trait
///
/// # 实现说明
/// - `utilities()` 返回 `["*"]` 表示适用全部电力公司（大小写不敏感）
/// - `affected_systems()` 非空表示多系统检测器
/// - `quick_check()` 为廉价预筛，`detect()` 做完整判断
pub trait ConfigurationDetector: Send + Sync {
    fn name(&self) -> &str;

    fn config_id(&self) -> &str;

    /// 优先级（数值越小越优先）
    fn priority(&self) -> u32;

    fn utilities(&self) -> &[&'static str];

    fn affected_systems(&self) -> &[SystemNumber] {
        &[]
    }

    fn quick_check(&self, _equipment: &SystemEquipment) -> bool {
        true
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch>;

    fn is_multi_system(&self) -> bool {
        !self.affected_systems().is_empty()
    }

    /// 电力公司是否适用
    fn applies_to_utility(&self, utility: &str) -> bool {
        self.utilities()
            .iter()
            .any(|u| *u == ANY_UTILITY || u.eq_ignore_ascii_case(utility))
    }
}

/// 内置检测器集合（未排序，由 Switchboard 负责排序）
pub fn default_detectors() -> Vec<Arc<dyn ConfigurationDetector>> {
    let mut detectors: Vec<Arc<dyn ConfigurationDetector>> = vec![
        Arc::new(PvOnlyDetector::string_inverter()),
        Arc::new(PvOnlyDetector::microinverter()),
        Arc::new(TeslaPw3MultiSystemDetector),
        Arc::new(TeslaPw3SingleSystemDetector::backup()),
        Arc::new(TeslaPw3SingleSystemDetector::no_backup()),
    ];
    detectors.extend(
        DcCoupledDetector::all()
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn ConfigurationDetector>),
    );
    detectors.extend(
        aps_generic_detectors()
            .into_iter()
            .map(|d| Arc::new(d) as Arc<dyn ConfigurationDetector>),
    );
    detectors.push(Arc::new(UtilityRequirementsDetector));
    detectors
}

// ==========================================
// 公共构建辅助
// ==========================================

/// 按单一输出选型的设备: ceil(output × 1.25)
///
/// 输出未知（≤0）时不设置额定电流，由写入器标记为待人工选择
pub(crate) fn sized_by_output(
    system: SystemNumber,
    section: BosSection,
    position: u8,
    equipment_type: &str,
    label: &str,
    output_amps: f64,
    tag: &str,
) -> BosEquipmentItem {
    let item = BosEquipmentItem::new(system, section, position, equipment_type);
    let amps = sizing::required_amps(output_amps);
    if amps == 0 {
        return item;
    }
    item.sized(label, sizing::single_calculation(output_amps, amps, tag), amps)
}

/// 交流耦合: ceil((逆变器 + 电池) × 1.25)
pub(crate) fn sized_ac_coupled(
    system: SystemNumber,
    section: BosSection,
    position: u8,
    equipment_type: &str,
    equipment: &SystemEquipment,
) -> BosEquipmentItem {
    let inverter = equipment.inverter_max_output_amps.unwrap_or(0.0);
    let battery = equipment.battery_max_output_amps.unwrap_or(0.0);
    let amps = sizing::required_amps(inverter + battery);
    let item = BosEquipmentItem::new(system, section, position, equipment_type);
    if amps == 0 {
        return item;
    }
    item.sized(
        "Total System Output (AC-Coupled)",
        sizing::ac_coupled_calculation(inverter, battery, amps),
        amps,
    )
}

/// 按备电子面板母排额定电流选型（不乘系数，默认 200A）
pub(crate) fn sized_by_backup_panel(
    system: SystemNumber,
    position: u8,
    equipment_type: &str,
    bus_rating: Option<u32>,
) -> BosEquipmentItem {
    let amps = bus_rating.unwrap_or(DEFAULT_BACKUP_PANEL_AMPS);
    let item = BosEquipmentItem::new(system, BosSection::Backup, position, equipment_type);
    item.sized("Backup Panel Rating", format!("{}A (panel rating)", amps), amps)
}

/// 未填写备电子面板母排额定电流时的默认值
pub const DEFAULT_BACKUP_PANEL_AMPS: u32 = 200;

/// 逆变器输出未知时的提示
pub(crate) fn output_warning(equipment: &SystemEquipment) -> Option<String> {
    match equipment.inverter_max_output_amps {
        Some(v) if v > 0.0 => None,
        _ => Some(format!(
            "系统 {} 逆变器最大输出未知，BOS 额定电流需人工确认",
            equipment.system
        )),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::equipment::SystemEquipment;
    use crate::domain::types::{
        BackupOption, BatteryChargingSource, CouplingType, InverterType, SystemNumber, SystemType,
    };

    /// APS 纯光伏组串系统
    pub fn aps_pv_inverter(system: SystemNumber, output: f64) -> SystemEquipment {
        let mut eq = SystemEquipment::empty(system, "APS");
        eq.has_solar_panels = true;
        eq.solar_quantity = 20;
        eq.system_type = Some(SystemType::Inverter);
        eq.inverter_make = Some("SolarEdge".to_string());
        eq.inverter_model = Some("SE7600A-US".to_string());
        eq.inverter_quantity = 1;
        eq.inverter_type = Some(InverterType::GridFollowing);
        eq.inverter_max_output_amps = Some(output);
        eq.battery_charging_source = BatteryChargingSource::GridOrRenewable;
        eq
    }

    /// APS 光伏 + 交流耦合电池
    pub fn aps_ac_battery(system: SystemNumber, batteries: u32, backup: bool) -> SystemEquipment {
        let mut eq = aps_pv_inverter(system, 32.0);
        eq.battery_quantity = batteries;
        eq.battery_make = Some("Enphase".to_string());
        eq.battery_model = Some("IQ Battery 5P".to_string());
        eq.battery_max_output_amps = Some(16.0);
        eq.coupling_type = CouplingType::Ac;
        eq.has_multiple_batteries = batteries > 1;
        if backup {
            eq.backup_option = BackupOption::WholeHome;
            eq.has_backup_panel = true;
            eq.requires_backup_power = true;
        }
        eq
    }
}
