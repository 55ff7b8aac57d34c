// ==========================================
// 光伏 BOS 配置引擎 - APS 通用配置表 (A-1 .. D)
// ==========================================
// 职责: APS 标准接线方案的规则表
// 说明: 规则以数据表形式声明，检测逻辑只有一份
// ==========================================

use super::{sized_ac_coupled, sized_by_output, ConfigurationDetector, DetectionContext};
use crate::domain::bos::{BosEquipmentItem, ConfigurationMatch, RequiredEquipment};
use crate::domain::equipment::SystemEquipment;
use crate::domain::types::{BatteryChargingSource, BosSection, Confidence, CouplingType};

/// 设备额定电流计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sizing {
    /// ceil((逆变器 + 电池) × 1.25)
    AcCoupled,
    /// ceil(逆变器 × 1.25)，输出未知按 100A
    DcCoupled,
    /// 不派生额定电流
    Unsized,
}

type Rule = fn(&SystemEquipment) -> bool;

pub struct ApsGenericDetector {
    config_id: &'static str,
    name: &'static str,
    priority: u32,
    rule: Rule,
    items: &'static [(&'static str, Sizing)],
}

fn grid_or_renewable_ac(eq: &SystemEquipment) -> bool {
    eq.has_solar_panels
        && eq.battery_charging_source == BatteryChargingSource::GridOrRenewable
        && eq.coupling_type == CouplingType::Ac
}

fn grid_only_ac(eq: &SystemEquipment) -> bool {
    !eq.has_solar_panels
        && eq.battery_quantity > 0
        && eq.battery_charging_source == BatteryChargingSource::GridOnly
        && eq.coupling_type == CouplingType::Ac
}

/// APS 通用配置表
pub fn aps_generic_detectors() -> Vec<ApsGenericDetector> {
    use Sizing::*;
    vec![
        ApsGenericDetector {
            config_id: "APS_A1",
            name: "APS A-1 (Grid-only + Backup)",
            priority: 10,
            rule: |eq| grid_only_ac(eq) && eq.has_backup_panel,
            items: &[
                ("Automatic Disconnect Switch", AcCoupled),
                ("Bi-Directional Meter", AcCoupled),
                ("Bi-Directional Meter", AcCoupled),
            ],
        },
        ApsGenericDetector {
            config_id: "APS_A2",
            name: "APS A-2 (Grid-only + PCS)",
            priority: 11,
            rule: |eq| grid_only_ac(eq) && !eq.has_backup_panel,
            items: &[("Disconnect Switch", AcCoupled), ("Bi-Directional Meter", AcCoupled)],
        },
        ApsGenericDetector {
            config_id: "APS_B1",
            name: "APS B-1 (Solar + Multiple Batteries + Backup)",
            priority: 12,
            rule: |eq| {
                grid_or_renewable_ac(eq)
                    && eq.battery_quantity > 1
                    && eq.has_multiple_batteries
                    && eq.has_backup_panel
            },
            items: &[
                ("String Combiner Panel", Unsized),
                ("Automatic Disconnect Switch", AcCoupled),
                ("Uni-Directional Meter", AcCoupled),
                ("Dedicated DER Combiner Panel", Unsized),
            ],
        },
        ApsGenericDetector {
            config_id: "APS_B2",
            name: "APS B-2 (Solar + Battery + PCS)",
            priority: 13,
            rule: |eq| {
                grid_or_renewable_ac(eq)
                    && eq.battery_quantity == 1
                    && !eq.has_backup_panel
                    && eq.supports_peak_shaving
            },
            items: &[("String Combiner Panel", Unsized), ("Bi-Directional Meter", AcCoupled)],
        },
        ApsGenericDetector {
            config_id: "APS_B3",
            name: "APS B-3 (Solar + Single Battery + Backup)",
            priority: 14,
            rule: |eq| {
                grid_or_renewable_ac(eq)
                    && eq.battery_quantity == 1
                    && eq.has_backup_panel
                    && !eq.has_multiple_batteries
            },
            items: &[
                ("String Combiner Panel", Unsized),
                ("Automatic Disconnect Switch", AcCoupled),
                ("Bi-Directional Meter", AcCoupled),
            ],
        },
        ApsGenericDetector {
            config_id: "APS_B4",
            name: "APS B-4 (Solar + Battery Standard)",
            priority: 15,
            rule: |eq| {
                grid_or_renewable_ac(eq)
                    && eq.battery_quantity == 1
                    && !eq.has_backup_panel
                    && !eq.supports_peak_shaving
            },
            items: &[("String Combiner Panel", Unsized), ("Bi-Directional Meter", AcCoupled)],
        },
        ApsGenericDetector {
            config_id: "APS_B5",
            name: "APS B-5 (Multiple Batteries + PCS)",
            priority: 16,
            rule: |eq| {
                grid_or_renewable_ac(eq)
                    && eq.battery_quantity > 1
                    && eq.has_multiple_batteries
                    && !eq.has_backup_panel
            },
            items: &[("String Combiner Panel", Unsized), ("Bi-Directional Meter", AcCoupled)],
        },
        ApsGenericDetector {
            config_id: "APS_C1",
            name: "APS C-1 (DC Coupled Hybrid)",
            priority: 17,
            rule: |eq| {
                eq.has_solar_panels
                    && eq.coupling_type == CouplingType::Dc
                    && eq.supports_peak_shaving
                    && !eq.has_backup_panel
            },
            items: &[
                ("String Combiner Panel", Unsized),
                ("Bi-Directional Meter", DcCoupled),
                ("Uni-Directional Meter", DcCoupled),
            ],
        },
        ApsGenericDetector {
            config_id: "APS_C2",
            name: "APS C-2 (DC Coupled Hybrid + Backup)",
            priority: 18,
            rule: |eq| {
                eq.has_solar_panels
                    && eq.coupling_type == CouplingType::Dc
                    && eq.supports_peak_shaving
                    && eq.has_backup_panel
            },
            items: &[
                ("String Combiner Panel", Unsized),
                ("Automatic Disconnect Switch", DcCoupled),
                ("Bi-Directional Meter", DcCoupled),
            ],
        },
        ApsGenericDetector {
            config_id: "APS_D",
            name: "APS D (Standby Battery)",
            priority: 19,
            rule: |eq| eq.is_standby_only && eq.battery_quantity > 0,
            items: &[("Transfer Switch", Unsized)],
        },
    ]
}

impl ApsGenericDetector {
    fn build_item(&self, eq: &SystemEquipment, position: u8, equipment_type: &str, sizing: Sizing) -> BosEquipmentItem {
        match sizing {
            Sizing::AcCoupled => sized_ac_coupled(eq.system, BosSection::Utility, position, equipment_type, eq),
            Sizing::DcCoupled => sized_by_output(
                eq.system,
                BosSection::Utility,
                position,
                equipment_type,
                "Inverter Output (DC-Coupled)",
                eq.inverter_max_output_amps.filter(|v| *v > 0.0).unwrap_or(100.0),
                "DC-Coupled",
            ),
            Sizing::Unsized => BosEquipmentItem::new(eq.system, BosSection::Utility, position, equipment_type),
        }
    }
}

impl ConfigurationDetector for ApsGenericDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn config_id(&self) -> &str {
        self.config_id
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn utilities(&self) -> &[&'static str] {
        &["APS"]
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        let eq = ctx.equipment;
        if !eq.utility_is("APS") || !(self.rule)(eq) {
            return None;
        }

        let mut m = ConfigurationMatch::new(self.config_id, self.name, self.priority, Confidence::Medium, eq.system);
        m.description = format!("APS 标准方案 {}", self.name);
        m.required_equipment = RequiredEquipment {
            solar_panels: eq.has_solar_panels,
            battery_quantity: eq.battery_quantity,
            battery_types: if eq.has_different_battery_types { 2 } else { u32::from(eq.battery_quantity > 0) },
            backup_panel: eq.has_backup_panel,
            sms: eq.has_sms,
            gateway: eq.has_gateway,
            inverter_types: Vec::new(),
        };
        m.bos_equipment = self
            .items
            .iter()
            .enumerate()
            .map(|(i, (equipment_type, sizing))| self.build_item(eq, i as u8 + 1, equipment_type, *sizing))
            .collect();
        if self.items.iter().any(|(_, s)| *s == Sizing::AcCoupled) && eq.total_output_amps() <= 0.0 {
            m.warnings.push("逆变器与电池输出均未知，BOS 额定电流需人工确认".to_string());
        }
        m.source = "aps_generic".to_string();
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::SystemNumber;
    use crate::engine::detectors::test_support::aps_ac_battery;

    fn fired(eq: &SystemEquipment) -> Vec<String> {
        let ctx = DetectionContext::single(eq);
        aps_generic_detectors()
            .iter()
            .filter_map(|d| d.detect(&ctx))
            .map(|m| m.config_id)
            .collect()
    }

    #[test]
    fn test_single_battery_with_backup_is_b3() {
        let eq = aps_ac_battery(SystemNumber::ONE, 1, true);
        assert_eq!(fired(&eq), vec!["APS_B3".to_string()]);

        let m = aps_generic_detectors()[4]
            .detect(&DetectionContext::single(&eq))
            .unwrap();
        // (32 + 16) × 1.25 = 60
        assert_eq!(m.bos_equipment[1].amp_rating, Some(60));
        assert!(m.bos_equipment[0].amp_rating.is_none());
    }

    #[test]
    fn test_multiple_batteries_without_backup_is_b5() {
        let eq = aps_ac_battery(SystemNumber::ONE, 2, false);
        assert_eq!(fired(&eq), vec!["APS_B5".to_string()]);
    }

    #[test]
    fn test_grid_only_standby_battery() {
        let mut eq = aps_ac_battery(SystemNumber::ONE, 1, false);
        eq.has_solar_panels = false;
        eq.battery_charging_source = BatteryChargingSource::GridOnly;
        eq.is_standby_only = true;
        assert_eq!(fired(&eq), vec!["APS_A2".to_string(), "APS_D".to_string()]);
    }
}
