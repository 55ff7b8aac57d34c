// ==========================================
// 光伏 BOS 配置引擎 - APS 直流耦合检测器
// ==========================================
// 条件: 系统 1 + APS + 组串逆变器 + DC 耦合 + 电池 + 光伏
// 变体: 有无 SMS × 有无备电子面板
// 选型: 交流侧 BOS 只按逆变器输出（电池在直流母线上）
// ==========================================

use super::{sized_by_backup_panel, sized_by_output, ConfigurationDetector, DetectionContext};
use crate::domain::bos::{
    ConfigurationMatch, MeterConfiguration, RequiredEquipment, UtilityMeterKind,
};
use crate::domain::equipment::SystemEquipment;
use crate::domain::types::{BosSection, Confidence, CouplingType, SystemNumber, SystemType};

/// 逆变器输出未知时的保守取值（A）
const DEFAULT_DC_INVERTER_OUTPUT: f64 = 100.0;

pub struct DcCoupledDetector {
    config_id: &'static str,
    name: &'static str,
    with_sms: bool,
    with_backup: bool,
}

impl DcCoupledDetector {
    pub fn new(with_sms: bool, with_backup: bool) -> Self {
        let (config_id, name) = match (with_sms, with_backup) {
            (true, true) => ("APS_DC_COUPLED_SMS_BACKUP", "APS DC Coupled + SMS + Backup"),
            (true, false) => ("APS_DC_COUPLED_SMS_NO_BACKUP", "APS DC Coupled + SMS + No Backup"),
            (false, true) => ("APS_DC_COUPLED_NO_SMS_BACKUP", "APS DC Coupled + No SMS + Backup"),
            (false, false) => (
                "APS_DC_COUPLED_NO_SMS_NO_BACKUP",
                "APS DC Coupled + No SMS + No Backup",
            ),
        };
        Self {
            config_id,
            name,
            with_sms,
            with_backup,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Self::new(true, true),
            Self::new(true, false),
            Self::new(false, true),
            Self::new(false, false),
        ]
    }
}

impl ConfigurationDetector for DcCoupledDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn config_id(&self) -> &str {
        self.config_id
    }

    /// 有备电的变体优先
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
        eq.system == SystemNumber::ONE
            && eq.system_type == Some(SystemType::Inverter)
            && eq.coupling_type == CouplingType::Dc
            && eq.battery_quantity > 0
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        let eq = ctx.equipment;
        let matched = eq.utility_is("APS")
            && self.quick_check(eq)
            && eq.has_solar_panels
            && eq.has_sms == self.with_sms
            && eq.has_backup_panel == self.with_backup;
        if !matched {
            return None;
        }

        let system = eq.system;
        let output = eq
            .inverter_max_output_amps
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_DC_INVERTER_OUTPUT);

        let mut items = Vec::new();
        if self.with_backup {
            items.push(sized_by_backup_panel(system, 1, "Uni-Directional Meter", eq.backup_panel_bus_rating));
            items.push(sized_by_backup_panel(
                system,
                2,
                "Uni-Directional Meter Line Side Disconnect",
                eq.backup_panel_bus_rating,
            ));
        }
        items.push(sized_by_output(
            system,
            BosSection::Utility,
            1,
            "Bi-Directional Meter DER Side Disconnect",
            "Inverter Output",
            output,
            "DC-Coupled",
        ));
        items.push(sized_by_output(
            system,
            BosSection::Utility,
            2,
            "Bi-Directional Meter",
            "Inverter Output",
            output,
            "DC-Coupled",
        ));
        // 无 SMS 时断路器直接放在逆变器之后
        let disconnect_section = if self.with_sms {
            BosSection::PostSms
        } else {
            BosSection::Utility
        };
        items.push(sized_by_output(
            system,
            disconnect_section,
            3,
            "Utility Disconnect",
            "Inverter Output (DC-Coupled)",
            output,
            "DC-Coupled",
        ));

        let mut m = ConfigurationMatch::new(self.config_id, self.name, self.priority(), Confidence::High, system);
        m.description = format!(
            "APS 直流耦合混合逆变器系统（{}，{}）",
            if self.with_sms { "含 SMS" } else { "无 SMS" },
            if self.with_backup {
                eq.backup_option.to_string()
            } else {
                "无备电".to_string()
            }
        );
        m.required_equipment = RequiredEquipment {
            solar_panels: true,
            battery_quantity: eq.battery_quantity,
            battery_types: if eq.has_different_battery_types { 2 } else { 1 },
            backup_panel: self.with_backup,
            sms: self.with_sms,
            inverter_types: vec!["Hybrid".to_string()],
            ..Default::default()
        };
        m.bos_equipment = items;
        m.meter_configuration = Some(MeterConfiguration {
            utility_meter: UtilityMeterKind::BiDirectional,
            production_metering: false,
        });
        m.notes = vec![format!(
            "直流耦合: 交流侧 BOS 按逆变器输出 {}A × 1.25 选型",
            crate::engine::sizing::format_amps(output)
        )];
        if eq.inverter_max_output_amps.filter(|v| *v > 0.0).is_none() {
            m.warnings.push(format!(
                "逆变器最大输出未知，按 {}A 估算",
                DEFAULT_DC_INVERTER_OUTPUT
            ));
        }
        m.source = "aps_dc_coupled".to_string();
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BackupOption, InverterType};
    use crate::engine::detectors::test_support::aps_pv_inverter;

    fn dc_system(sms: bool, backup: bool) -> SystemEquipment {
        let mut eq = aps_pv_inverter(SystemNumber::ONE, 32.0);
        eq.inverter_type = Some(InverterType::Hybrid);
        eq.coupling_type = CouplingType::Dc;
        eq.battery_quantity = 1;
        eq.has_sms = sms;
        if backup {
            eq.backup_option = BackupOption::PartialHome;
            eq.has_backup_panel = true;
            eq.backup_panel_bus_rating = Some(125);
        }
        eq
    }

    #[test]
    fn test_only_matching_variant_fires() {
        let eq = dc_system(true, true);
        let ctx = DetectionContext::single(&eq);
        let fired: Vec<_> = DcCoupledDetector::all()
            .into_iter()
            .filter_map(|d| d.detect(&ctx))
            .map(|m| m.config_id)
            .collect();
        assert_eq!(fired, vec!["APS_DC_COUPLED_SMS_BACKUP".to_string()]);
    }

    #[test]
    fn test_backup_items_use_panel_rating() {
        let eq = dc_system(true, true);
        let m = DcCoupledDetector::new(true, true)
            .detect(&DetectionContext::single(&eq))
            .unwrap();

        let backup: Vec<_> = m.items_in(BosSection::Backup).collect();
        assert_eq!(backup.len(), 2);
        assert!(backup.iter().all(|i| i.amp_rating == Some(125)));

        let post_sms: Vec<_> = m.items_in(BosSection::PostSms).collect();
        assert_eq!(post_sms.len(), 1);
        assert_eq!(post_sms[0].amp_rating, Some(40));
    }

    #[test]
    fn test_without_sms_disconnect_stays_in_utility() {
        let eq = dc_system(false, false);
        let m = DcCoupledDetector::new(false, false)
            .detect(&DetectionContext::single(&eq))
            .unwrap();
        assert_eq!(m.items_in(BosSection::Utility).count(), 3);
        assert_eq!(m.priority, 5);
    }

    #[test]
    fn test_unknown_output_defaults_to_100a() {
        let mut eq = dc_system(false, false);
        eq.inverter_max_output_amps = None;
        let m = DcCoupledDetector::new(false, false)
            .detect(&DetectionContext::single(&eq))
            .unwrap();
        assert!(m.bos_equipment.iter().all(|i| i.amp_rating == Some(125)));
        assert_eq!(m.warnings.len(), 1);
    }

    #[test]
    fn test_system_two_is_not_matched() {
        let mut eq = dc_system(true, false);
        eq.system = SystemNumber::TWO;
        assert!(DcCoupledDetector::new(true, false)
            .detect(&DetectionContext::single(&eq))
            .is_none());
    }
}
