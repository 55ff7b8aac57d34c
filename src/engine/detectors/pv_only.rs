// ==========================================
// 光伏 BOS 配置引擎 - APS 纯光伏检测器
// ==========================================
// 条件: APS + 光伏 + 无电池 + 无 SMS + 无备电
// 设备: Uni-Directional Meter (1) + Utility Disconnect (2)，均为 ceil(逆变器 × 1.25)
// ==========================================

use super::{output_warning, sized_by_output, ConfigurationDetector, DetectionContext};
use crate::domain::bos::{
    ConfigurationMatch, MeterConfiguration, RequiredEquipment, UtilityMeterKind,
};
use crate::domain::equipment::SystemEquipment;
use crate::domain::types::{BosSection, Confidence, SystemType};

pub struct PvOnlyDetector {
    config_id: &'static str,
    name: &'static str,
    system_type: SystemType,
}

impl PvOnlyDetector {
    pub fn string_inverter() -> Self {
        Self {
            config_id: "APS_PV_ONLY_STRING_INVERTER",
            name: "APS PV-Only String Inverter (No Battery, No Backup)",
            system_type: SystemType::Inverter,
        }
    }

    pub fn microinverter() -> Self {
        Self {
            config_id: "APS_PV_ONLY_MICROINVERTER",
            name: "APS PV-Only Microinverter (No Battery, No Backup)",
            system_type: SystemType::Microinverter,
        }
    }
}

impl ConfigurationDetector for PvOnlyDetector {
    fn name(&self) -> &str {
        self.name
    }

    fn config_id(&self) -> &str {
        self.config_id
    }

    fn priority(&self) -> u32 {
        3
    }

    fn utilities(&self) -> &[&'static str] {
        &["APS"]
    }

    fn quick_check(&self, eq: &SystemEquipment) -> bool {
        eq.system_type == Some(self.system_type)
            && eq.has_solar_panels
            && eq.battery_quantity == 0
            && !eq.has_backup_panel
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        let eq = ctx.equipment;
        let matched = eq.utility_is("APS")
            && self.quick_check(eq)
            && !eq.has_sms
            && !eq.backup_option.has_backup();
        if !matched {
            return None;
        }

        let output = eq.inverter_max_output_amps.unwrap_or(0.0);
        let label = "Inverter Output (PV-Only)";
        let system = eq.system;

        let mut m = ConfigurationMatch::new(
            self.config_id,
            self.name,
            self.priority(),
            Confidence::High,
            system,
        );
        m.description = match self.system_type {
            SystemType::Microinverter => {
                "APS 微逆纯光伏系统：并网，无储能，无备电".to_string()
            }
            _ => "APS 组串逆变器纯光伏系统：并网，无储能，无备电".to_string(),
        };
        m.required_equipment = RequiredEquipment {
            solar_panels: true,
            inverter_types: vec!["Grid Following".to_string(), "Grid Forming/Following".to_string()],
            ..Default::default()
        };
        m.bos_equipment = vec![
            sized_by_output(system, BosSection::Utility, 1, "Uni-Directional Meter", label, output, "PV-Only"),
            sized_by_output(system, BosSection::Utility, 2, "Utility Disconnect", label, output, "PV-Only"),
        ];
        m.meter_configuration = Some(MeterConfiguration {
            utility_meter: UtilityMeterKind::UniDirectional,
            production_metering: true,
        });
        m.notes = vec![
            "纯光伏系统，无储能".to_string(),
            "APS 要求光伏发电单向计量".to_string(),
        ];
        m.warnings.extend(output_warning(eq));
        m.source = "aps_pv_only".to_string();
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::detectors::test_support::aps_pv_inverter;
    use crate::domain::types::SystemNumber;

    #[test]
    fn test_string_inverter_items_sized_to_output() {
        let eq = aps_pv_inverter(SystemNumber::ONE, 32.0);
        let m = PvOnlyDetector::string_inverter()
            .detect(&DetectionContext::single(&eq))
            .unwrap();

        assert_eq!(m.bos_equipment.len(), 2);
        assert_eq!(m.bos_equipment[0].equipment_type, "Uni-Directional Meter");
        assert_eq!(m.bos_equipment[0].amp_rating, Some(40));
        assert_eq!(m.bos_equipment[1].equipment_type, "Utility Disconnect");
        assert_eq!(m.bos_equipment[1].position, 2);
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_microinverter_detector_ignores_string_systems() {
        let eq = aps_pv_inverter(SystemNumber::ONE, 32.0);
        assert!(PvOnlyDetector::microinverter()
            .detect(&DetectionContext::single(&eq))
            .is_none());
    }

    #[test]
    fn test_rejects_sms_and_other_utilities() {
        let mut eq = aps_pv_inverter(SystemNumber::ONE, 32.0);
        eq.has_sms = true;
        assert!(PvOnlyDetector::string_inverter()
            .detect(&DetectionContext::single(&eq))
            .is_none());

        let mut eq = aps_pv_inverter(SystemNumber::ONE, 32.0);
        eq.utility_name = "SRP".to_string();
        assert!(PvOnlyDetector::string_inverter()
            .detect(&DetectionContext::single(&eq))
            .is_none());
    }

    #[test]
    fn test_unknown_output_leaves_rating_open() {
        let mut eq = aps_pv_inverter(SystemNumber::TWO, 0.0);
        eq.inverter_max_output_amps = None;
        let m = PvOnlyDetector::string_inverter()
            .detect(&DetectionContext::single(&eq))
            .unwrap();
        assert!(m.bos_equipment.iter().all(|i| i.amp_rating.is_none()));
        assert_eq!(m.warnings.len(), 1);
    }
}
