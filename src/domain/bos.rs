// ==========================================
// 光伏 BOS 配置引擎 - BOS 设备与配置匹配
// ==========================================
// 职责: 定义匹配器输出（ConfigurationMatch）及其 BOS 设备清单
// ==========================================

use crate::domain::types::{BosSection, Confidence, SystemNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// SizingInfo - 选型计算说明
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingInfo {
    /// 计算依据，例如 "Inverter Max Output"
    pub label: String,
    /// 计算过程，例如 "20A × 1.25 = 25A (PV-Only)"
    pub calculation: String,
    /// 计算结果（A）
    pub value: u32,
}

// ==========================================
// BosEquipmentItem - 单个 BOS 设备
// ==========================================

/// 单个 BOS 设备
///
/// # 说明
/// - position: 区块内位置（1..=6）；Combine 区块中为 Post Combine Type 序号（1..=3）
/// - amp_rating: 派生额定电流，恒等于 ceil(输出 × 1.25)
/// - make/model 为空时由写入器按设备目录选型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BosEquipmentItem {
    pub equipment_type: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub amp_rating: Option<u32>,
    pub is_new: bool,
    pub position: u8,
    pub section: BosSection,
    pub system: SystemNumber,
    pub min_amp_rating: Option<u32>,
    pub preferred_make: Option<String>,
    pub sizing: Option<SizingInfo>,
    pub requires_user_selection: bool,
}

impl BosEquipmentItem {
    pub fn new(
        system: SystemNumber,
        section: BosSection,
        position: u8,
        equipment_type: impl Into<String>,
    ) -> Self {
        Self {
            equipment_type: equipment_type.into(),
            make: None,
            model: None,
            amp_rating: None,
            is_new: true,
            position,
            section,
            system,
            min_amp_rating: None,
            preferred_make: None,
            sizing: None,
            requires_user_selection: false,
        }
    }

    /// 设置派生额定电流（同时作为目录选型下限）
    pub fn sized(mut self, label: impl Into<String>, calculation: impl Into<String>, amps: u32) -> Self {
        self.amp_rating = Some(amps);
        self.min_amp_rating = Some(amps);
        self.sizing = Some(SizingInfo {
            label: label.into(),
            calculation: calculation.into(),
            value: amps,
        });
        self
    }

    /// 固定品牌/型号/额定电流（不走目录选型）
    pub fn fixed(mut self, make: impl Into<String>, model: impl Into<String>, amps: u32) -> Self {
        self.make = Some(make.into());
        self.model = Some(model.into());
        self.amp_rating = Some(amps);
        self
    }

    pub fn preferred_make(mut self, make: impl Into<String>) -> Self {
        self.preferred_make = Some(make.into());
        self
    }

    pub fn existing(mut self) -> Self {
        self.is_new = false;
        self
    }

    /// 品牌、型号、额定电流是否已完整指定
    pub fn is_fully_specified(&self) -> bool {
        self.make.is_some() && self.model.is_some() && self.amp_rating.is_some()
    }
}

// ==========================================
// RequiredEquipment - 配置所需设备
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredEquipment {
    pub solar_panels: bool,
    pub battery_quantity: u32,
    pub battery_types: u32,
    pub backup_panel: bool,
    pub sms: bool,
    pub gateway: bool,
    pub inverter_types: Vec<String>,
}

impl RequiredEquipment {
    pub fn is_pv_only(&self) -> bool {
        self.battery_quantity == 0
    }
}

// ==========================================
// MeterConfiguration - 计量方案
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtilityMeterKind {
    BiDirectional,
    UniDirectional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterConfiguration {
    pub utility_meter: UtilityMeterKind,
    pub production_metering: bool,
}

// ==========================================
// MultiSystemConfig - 多系统落点
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLanding {
    pub system: SystemNumber,
    /// 落点设备名称，例如 "Main Panel A" / "Sol-Ark"
    pub combines_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSystemConfig {
    pub total_systems: u8,
    pub landings: Vec<SystemLanding>,
}

// ==========================================
// ConfigurationMatch - 配置匹配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationMatch {
    pub config_id: String,
    pub config_name: String,
    pub description: String,
    pub priority: u32,
    pub confidence: Confidence,
    pub system: SystemNumber,
    pub required_equipment: RequiredEquipment,
    pub bos_equipment: Vec<BosEquipmentItem>,
    pub meter_configuration: Option<MeterConfiguration>,
    pub multi_system: Option<MultiSystemConfig>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
    pub source: String,
    pub detected_at: DateTime<Utc>,
}

impl ConfigurationMatch {
    pub fn new(
        config_id: impl Into<String>,
        config_name: impl Into<String>,
        priority: u32,
        confidence: Confidence,
        system: SystemNumber,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            config_name: config_name.into(),
            description: String::new(),
            priority,
            confidence,
            system,
            required_equipment: RequiredEquipment::default(),
            bos_equipment: Vec::new(),
            meter_configuration: None,
            multi_system: None,
            notes: Vec::new(),
            warnings: Vec::new(),
            source: "detector".to_string(),
            detected_at: Utc::now(),
        }
    }

    pub fn is_multi_system(&self) -> bool {
        self.multi_system.is_some()
    }

    pub fn is_pv_only(&self) -> bool {
        self.required_equipment.is_pv_only()
    }

    /// 指定分区的设备
    pub fn items_in(&self, section: BosSection) -> impl Iterator<Item = &BosEquipmentItem> {
        self.bos_equipment.iter().filter(move |i| i.section == section)
    }
}

// ==========================================
// MultiSystemAnalysis - 项目级分析结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAnalysis {
    pub system: SystemNumber,
    pub matches: Vec<ConfigurationMatch>,
    pub best_match: Option<ConfigurationMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiSystemAnalysis {
    pub systems: Vec<SystemAnalysis>,
    pub total_systems: usize,
    pub systems_with_matches: usize,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

impl MultiSystemAnalysis {
    /// 每个系统的最佳匹配（按系统编号升序）
    pub fn best_matches(&self) -> Vec<ConfigurationMatch> {
        self.systems
            .iter()
            .filter_map(|s| s.best_match.clone())
            .collect()
    }

    pub fn best_match_for(&self, system: SystemNumber) -> Option<&ConfigurationMatch> {
        self.systems
            .iter()
            .find(|s| s.system == system)
            .and_then(|s| s.best_match.as_ref())
    }

    pub fn has_matches(&self) -> bool {
        self.systems_with_matches > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sized_item_sets_min_rating() {
        let item = BosEquipmentItem::new(SystemNumber::ONE, BosSection::Utility, 1, "Utility Disconnect")
            .sized("Inverter Max Output", "20A × 1.25 = 25A", 25);

        assert_eq!(item.amp_rating, Some(25));
        assert_eq!(item.min_amp_rating, Some(25));
        assert!(!item.is_fully_specified());
        assert_eq!(item.sizing.as_ref().map(|s| s.value), Some(25));
    }

    #[test]
    fn test_items_in_section() {
        let mut m = ConfigurationMatch::new("X", "X", 3, Confidence::High, SystemNumber::ONE);
        m.bos_equipment.push(BosEquipmentItem::new(SystemNumber::ONE, BosSection::Utility, 1, "A"));
        m.bos_equipment.push(BosEquipmentItem::new(SystemNumber::ONE, BosSection::Backup, 1, "B"));
        assert_eq!(m.items_in(BosSection::Utility).count(), 1);
        assert!(m.is_pv_only());
    }
}
