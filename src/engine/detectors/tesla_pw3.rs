// ==========================================
// 光伏 BOS 配置引擎 - Tesla Powerwall 3 + Gateway 3 (APS)
// ==========================================
// 多系统: 系统 2 = PW3 + Gateway 3 + 全屋备电；系统 1 = 微逆纯光伏
// 单系统: 系统 1 = PW3 + Gateway 3（有/无备电两种）
// 说明: Gateway 3 登记在 SMS 字段中（make=Tesla, model=Gateway 3）
// ==========================================

use super::{sized_ac_coupled, sized_by_backup_panel, ConfigurationDetector, DetectionContext};
use crate::domain::bos::{
    BosEquipmentItem, ConfigurationMatch, MeterConfiguration, MultiSystemConfig, RequiredEquipment,
    SystemLanding, UtilityMeterKind,
};
use crate::domain::equipment::SystemEquipment;
use crate::domain::types::{BackupOption, BosSection, Confidence, SystemNumber, SystemType};

fn is_tesla_powerwall3(eq: &SystemEquipment) -> bool {
    let make = eq.inverter_make.as_deref().unwrap_or_default().to_lowercase();
    make.contains("tesla") || make.contains("powerwall")
}

fn has_gateway3(eq: &SystemEquipment) -> bool {
    if !eq.has_sms {
        return false;
    }
    let make = eq.sms_make.as_deref().unwrap_or_default().to_lowercase();
    let model = eq.sms_model.as_deref().unwrap_or_default().to_lowercase();
    make.contains("tesla") && (model.contains("gateway 3") || model.contains("gateway3"))
}

// ==========================================
// 多系统检测器
// ==========================================
pub struct TeslaPw3MultiSystemDetector;

static MULTI_AFFECTED: [SystemNumber; 2] = [SystemNumber::ONE, SystemNumber::TWO];

impl TeslaPw3MultiSystemDetector {
    fn system1_matches(sys1: &SystemEquipment) -> bool {
        sys1.system_type == Some(SystemType::Microinverter)
            && sys1.has_solar_panels
            && sys1.battery_quantity == 0
            && !sys1.has_sms
    }
}

impl ConfigurationDetector for TeslaPw3MultiSystemDetector {
    fn name(&self) -> &str {
        "Tesla Powerwall 3 + Gateway 3 + APS (Multi-System)"
    }

    fn config_id(&self) -> &str {
        "TESLA_PW3_GATEWAY3_APS"
    }

    fn priority(&self) -> u32 {
        3
    }

    fn utilities(&self) -> &[&'static str] {
        &["APS"]
    }

    fn affected_systems(&self) -> &[SystemNumber] {
        &MULTI_AFFECTED
    }

    fn quick_check(&self, eq: &SystemEquipment) -> bool {
        eq.system == SystemNumber::TWO
            && eq.battery_quantity > 0
            && eq.backup_option == BackupOption::WholeHome
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        let sys2 = ctx.equipment;
        let sys2_matches = sys2.utility_is("APS")
            && self.quick_check(sys2)
            && !sys2.has_solar_panels
            && is_tesla_powerwall3(sys2)
            && has_gateway3(sys2)
            && sys2.has_backup_panel;
        if !sys2_matches {
            return None;
        }

        let sys1 = ctx.sibling(SystemNumber::ONE)?;
        if !Self::system1_matches(sys1) {
            return None;
        }

        let mut items = vec![
            // 系统 1 光伏计量: 固定型号
            BosEquipmentItem::new(SystemNumber::ONE, BosSection::Utility, 1, "Uni-Directional Meter")
                .fixed("Milbank", "U5929XL", 100),
            BosEquipmentItem::new(
                SystemNumber::ONE,
                BosSection::Utility,
                2,
                "Uni-Directional Meter Line Side Disconnect",
            )
            .preferred_make("Siemens"),
            sized_by_backup_panel(SystemNumber::TWO, 1, "Uni-Directional Meter", sys2.backup_panel_bus_rating),
            sized_by_backup_panel(
                SystemNumber::TWO,
                2,
                "Uni-Directional Meter Line Side Disconnect",
                sys2.backup_panel_bus_rating,
            ),
        ];
        for (position, equipment_type) in [
            (1, "Bi-Directional Meter DER Side Disconnect"),
            (2, "Bi-Directional Meter"),
            (3, "Utility Disconnect"),
        ] {
            items.push(sized_ac_coupled(SystemNumber::TWO, BosSection::Combine, position, equipment_type, sys2));
        }

        let mut m = ConfigurationMatch::new(
            self.config_id(),
            self.name(),
            self.priority(),
            Confidence::Exact,
            SystemNumber::TWO,
        );
        m.description = "系统 1 微逆光伏接入 Powerwall 3，系统 2 Powerwall 3 + Gateway 3 全屋备电".to_string();
        m.required_equipment = RequiredEquipment {
            solar_panels: true,
            battery_quantity: sys2.battery_quantity,
            battery_types: 1,
            backup_panel: true,
            sms: true,
            gateway: true,
            inverter_types: vec!["Grid Forming/Following".to_string()],
        };
        m.bos_equipment = items;
        m.meter_configuration = Some(MeterConfiguration {
            utility_meter: UtilityMeterKind::BiDirectional,
            production_metering: true,
        });
        m.multi_system = Some(MultiSystemConfig {
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
        });
        m.notes = vec!["Powerwall 3 为交流耦合，合并后 BOS 按逆变器 + 电池输出选型".to_string()];
        if sys2.total_output_amps() <= 0.0 {
            m.warnings.push("系统 2 输出未知，合并后 BOS 额定电流需人工确认".to_string());
        }
        m.source = "tesla_pw3".to_string();
        Some(m)
    }
}

// ==========================================
// 单系统检测器
// ==========================================
pub struct TeslaPw3SingleSystemDetector {
    with_backup: bool,
}

impl TeslaPw3SingleSystemDetector {
    pub fn backup() -> Self {
        Self { with_backup: true }
    }

    pub fn no_backup() -> Self {
        Self { with_backup: false }
    }

    fn backup_matches(&self, eq: &SystemEquipment) -> bool {
        if self.with_backup {
            eq.backup_option.has_backup() && eq.has_backup_panel
        } else {
            !eq.backup_option.has_backup() || !eq.has_backup_panel
        }
    }
}

impl ConfigurationDetector for TeslaPw3SingleSystemDetector {
    fn name(&self) -> &str {
        if self.with_backup {
            "Tesla Powerwall 3 + Gateway 3 + APS (Single System)"
        } else {
            "Tesla Powerwall 3 + Gateway 3 + APS No Backup (Single System)"
        }
    }

    fn config_id(&self) -> &str {
        if self.with_backup {
            "TESLA_PW3_GATEWAY3_APS_SINGLE_BACKUP"
        } else {
            "TESLA_PW3_GATEWAY3_APS_NO_BACKUP"
        }
    }

    fn priority(&self) -> u32 {
        if self.with_backup {
            4
        } else {
            5
        }
    }

    fn utilities(&self) -> &[&'static str] {
        &["APS"]
    }

    fn quick_check(&self, eq: &SystemEquipment) -> bool {
        eq.system == SystemNumber::ONE && is_tesla_powerwall3(eq) && has_gateway3(eq)
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        let eq = ctx.equipment;
        let matched = eq.utility_is("APS")
            && self.quick_check(eq)
            && eq.system_type == Some(SystemType::Inverter)
            && self.backup_matches(eq);
        if !matched {
            return None;
        }

        let system = eq.system;
        let mut items = Vec::new();
        let meter_section = if self.with_backup {
            items.push(sized_by_backup_panel(system, 1, "Uni-Directional Meter", eq.backup_panel_bus_rating));
            items.push(sized_by_backup_panel(
                system,
                2,
                "Uni-Directional Meter Line Side Disconnect",
                eq.backup_panel_bus_rating,
            ));
            BosSection::Utility
        } else {
            BosSection::PostSms
        };
        items.push(sized_ac_coupled(system, meter_section, 1, "Bi-Directional Meter DER Side Disconnect", eq));
        items.push(sized_ac_coupled(system, meter_section, 2, "Bi-Directional Meter", eq));
        items.push(sized_ac_coupled(system, BosSection::PostSms, 3, "Utility Disconnect", eq));

        let mut m = ConfigurationMatch::new(self.config_id(), self.name(), self.priority(), Confidence::High, system);
        m.description = if self.with_backup {
            format!("Powerwall 3 + Gateway 3，{}", eq.backup_option)
        } else {
            "Powerwall 3 + Gateway 3，无备电".to_string()
        };
        m.required_equipment = RequiredEquipment {
            solar_panels: eq.has_solar_panels,
            battery_quantity: eq.battery_quantity,
            battery_types: 1,
            backup_panel: self.with_backup,
            sms: true,
            gateway: true,
            inverter_types: vec!["Grid Forming/Following".to_string()],
        };
        m.bos_equipment = items;
        m.meter_configuration = Some(MeterConfiguration {
            utility_meter: UtilityMeterKind::BiDirectional,
            production_metering: false,
        });
        m.source = "tesla_pw3".to_string();
        Some(m)
    }
}
