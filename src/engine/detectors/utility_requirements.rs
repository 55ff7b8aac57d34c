// ==========================================
// 光伏 BOS 配置引擎 - 电力公司要求兜底检测器
// ==========================================
// 职责: 无专用检测器命中时，按 utility_bos_requirement 表的 bos_1..6 生成清单
// ==========================================

use super::{output_warning, sized_by_output, ConfigurationDetector, DetectionContext, ANY_UTILITY};
use crate::domain::bos::{ConfigurationMatch, RequiredEquipment};
use crate::domain::types::{BosSection, Confidence};
use crate::engine::bos_catalog::{standard_equipment_type, translate_for_utility};

pub struct UtilityRequirementsDetector;

impl ConfigurationDetector for UtilityRequirementsDetector {
    fn name(&self) -> &str {
        "Utility BOS Requirements"
    }

    fn config_id(&self) -> &str {
        "GENERIC_UTILITY_REQUIREMENTS"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn utilities(&self) -> &[&'static str] {
        &[ANY_UTILITY]
    }

    fn quick_check(&self, eq: &crate::domain::equipment::SystemEquipment) -> bool {
        eq.has_inverter() && eq.utility_requirements.is_some()
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        let eq = ctx.equipment;
        if !self.quick_check(eq) {
            return None;
        }
        let requirements = eq.utility_requirements.as_ref()?;
        let utility = Some(requirements.utility_name.as_str());
        let output = eq.inverter_max_output_amps.unwrap_or(0.0);

        let items: Vec<_> = requirements
            .required_types()
            .map(|(position, required)| {
                let equipment_type = translate_for_utility(standard_equipment_type(required), utility);
                sized_by_output(
                    eq.system,
                    BosSection::Utility,
                    position,
                    equipment_type,
                    "Inverter Output",
                    output,
                    "Utility Requirement",
                )
            })
            .collect();
        if items.is_empty() {
            return None;
        }

        let mut m = ConfigurationMatch::new(
            self.config_id(),
            format!("{} BOS Requirements", requirements.utility_name),
            self.priority(),
            Confidence::Low,
            eq.system,
        );
        m.description = format!(
            "按 {} 的 BOS 要求生成（组合: {}）",
            requirements.utility_name,
            requirements.combination.as_deref().unwrap_or("-")
        );
        m.required_equipment = RequiredEquipment {
            solar_panels: eq.has_solar_panels,
            battery_quantity: eq.battery_quantity,
            ..Default::default()
        };
        m.bos_equipment = items;
        m.warnings.extend(output_warning(eq));
        m.source = "utility_requirements".to_string();
        Some(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::equipment::UtilityRequirements;
    use crate::domain::types::SystemNumber;
    use crate::engine::detectors::test_support::aps_pv_inverter;

    #[test]
    fn test_requirements_are_translated_and_sized() {
        let mut eq = aps_pv_inverter(SystemNumber::ONE, 20.0);
        eq.utility_name = "SRP".to_string();
        eq.utility_requirements = Some(UtilityRequirements {
            utility_name: "SRP".to_string(),
            state: Some("AZ".to_string()),
            combination: Some("PV".to_string()),
            bos_types: [
                Some("AC Disconnect".to_string()),
                None,
                Some("PV Meter".to_string()),
                None,
                None,
                None,
            ],
        });

        let m = UtilityRequirementsDetector
            .detect(&DetectionContext::single(&eq))
            .unwrap();
        assert_eq!(m.bos_equipment.len(), 2);
        assert_eq!(m.bos_equipment[0].equipment_type, "DER Meter Disconnect Switch");
        assert_eq!(m.bos_equipment[1].equipment_type, "Dedicated DER Meter");
        assert_eq!(m.bos_equipment[1].position, 3);
        assert!(m.bos_equipment.iter().all(|i| i.amp_rating == Some(25)));
    }

    #[test]
    fn test_without_requirements_no_match() {
        let eq = aps_pv_inverter(SystemNumber::ONE, 20.0);
        assert!(UtilityRequirementsDetector
            .detect(&DetectionContext::single(&eq))
            .is_none());
    }
}
