// ==========================================
// 光伏 BOS 配置引擎 - 领域类型定义
// ==========================================
// 职责: 系统编号、系统类型、逆变器/耦合/备电分类、BOS 分区等枚举
// 说明: 字符串模糊匹配只允许出现在本文件的 classify/from_field 入口
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// 系统编号 (System Number)
// ==========================================
// 红线: 一个项目最多 4 个系统，编号 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SystemNumber(u8);

/// 无效系统编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("无效的系统编号: {0} (有效范围 1..=4)")]
pub struct InvalidSystemNumber(pub u8);

impl SystemNumber {
    /// 单个项目允许的最大系统数
    pub const MAX: u8 = 4;

    /// 全部系统编号（升序）
    pub const ALL: [SystemNumber; 4] = [
        SystemNumber(1),
        SystemNumber(2),
        SystemNumber(3),
        SystemNumber(4),
    ];

    pub const ONE: SystemNumber = SystemNumber(1);
    pub const TWO: SystemNumber = SystemNumber(2);

    pub fn new(n: u8) -> Result<Self, InvalidSystemNumber> {
        Self::try_from(n)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 字段前缀，例如 "sys2_"
    pub fn prefix(self) -> String {
        format!("sys{}_", self.0)
    }
}

impl TryFrom<u8> for SystemNumber {
    type Error = InvalidSystemNumber;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=Self::MAX).contains(&value) {
            Ok(SystemNumber(value))
        } else {
            Err(InvalidSystemNumber(value))
        }
    }
}

impl From<SystemNumber> for u8 {
    fn from(value: SystemNumber) -> Self {
        value.0
    }
}

impl fmt::Display for SystemNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ==========================================
// 系统类型 (System Type)
// ==========================================
// 来源字段: sys{N}_selectedsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemType {
    Microinverter, // 微逆系统
    Inverter,      // 组串逆变器系统
    BatteryOnly,   // 纯储能系统
}

impl SystemType {
    /// 从 selectedsystem 字段值解析
    pub fn from_field(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "microinverter" | "micro-inverter" | "micro_inverter" => Some(SystemType::Microinverter),
            "inverter" | "string-inverter" | "string_inverter" => Some(SystemType::Inverter),
            "batteryonly" | "battery-only" | "battery_only" => Some(SystemType::BatteryOnly),
            _ => None,
        }
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemType::Microinverter => write!(f, "MICROINVERTER"),
            SystemType::Inverter => write!(f, "INVERTER"),
            SystemType::BatteryOnly => write!(f, "BATTERY_ONLY"),
        }
    }
}

// ==========================================
// 逆变器类型 (Inverter Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InverterType {
    GridFollowing,        // 并网跟随型
    GridFormingFollowing, // 构网/跟网双模式
    Hybrid,               // 混合逆变器（直流耦合储能）
}

impl InverterType {
    /// 按品牌/型号识别逆变器类型
    ///
    /// # 返回
    /// - None: 品牌与型号均缺失
    pub fn classify(make: Option<&str>, model: Option<&str>) -> Option<Self> {
        if make.is_none() && model.is_none() {
            return None;
        }

        let make = make.unwrap_or_default().to_lowercase();
        let model = model.unwrap_or_default().to_lowercase();
        let combined = format!("{} {}", make, model);

        let is_hybrid = combined.contains("hybrid")
            || (make.contains("solaredge") && model.contains("hd-wave"))
            || make.contains("goodwe")
            || make.contains("growatt")
            || make.contains("sol-ark")
            || make.contains("solark");
        if is_hybrid {
            return Some(InverterType::Hybrid);
        }

        let is_forming = combined.contains("forming")
            || combined.contains("powerwall")
            || combined.contains("backup interface")
            || combined.contains("agate")
            || make.contains("franklin")
            || make.contains("tesla");
        if is_forming {
            return Some(InverterType::GridFormingFollowing);
        }

        Some(InverterType::GridFollowing)
    }
}

impl fmt::Display for InverterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InverterType::GridFollowing => write!(f, "GRID_FOLLOWING"),
            InverterType::GridFormingFollowing => write!(f, "GRID_FORMING_FOLLOWING"),
            InverterType::Hybrid => write!(f, "HYBRID"),
        }
    }
}

// ==========================================
// 储能耦合方式 (Coupling Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouplingType {
    Ac,
    Dc,
}

impl CouplingType {
    /// 解析电池规格表中的 couple_type（"AC" / "DC" / "DC Coupled" 等）
    pub fn from_lookup(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with("dc") {
            Some(CouplingType::Dc)
        } else if v.starts_with("ac") {
            Some(CouplingType::Ac)
        } else {
            None
        }
    }
}

impl fmt::Display for CouplingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CouplingType::Ac => write!(f, "AC"),
            CouplingType::Dc => write!(f, "DC"),
        }
    }
}

// ==========================================
// 备电选项 (Backup Option)
// ==========================================
// 来源字段: sys{N}_backup_option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackupOption {
    WholeHome,   // 全屋备电
    PartialHome, // 部分备电
    NoBackup,    // 无备电
}

impl BackupOption {
    pub fn from_field(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "whole home" || v == "whole_home" => BackupOption::WholeHome,
            Some(v) if v == "partial home" || v == "partial_home" => BackupOption::PartialHome,
            _ => BackupOption::NoBackup,
        }
    }

    pub fn has_backup(self) -> bool {
        !matches!(self, BackupOption::NoBackup)
    }
}

impl fmt::Display for BackupOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupOption::WholeHome => write!(f, "Whole Home"),
            BackupOption::PartialHome => write!(f, "Partial Home"),
            BackupOption::NoBackup => write!(f, "None"),
        }
    }
}

// ==========================================
// 电池充电来源
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryChargingSource {
    GridOnly,
    GridOrRenewable,
}

impl BatteryChargingSource {
    /// 无光伏时只能由电网充电；否则以 battery_charging_source 字段为准
    pub fn resolve(has_solar: bool, value: Option<&str>) -> Self {
        let grid_only = value
            .map(|v| v.trim().eq_ignore_ascii_case("grid-only"))
            .unwrap_or(false);
        if !has_solar || grid_only {
            BatteryChargingSource::GridOnly
        } else {
            BatteryChargingSource::GridOrRenewable
        }
    }
}

// ==========================================
// BOS 分区 (BOS Section)
// ==========================================
// 决定字段前缀与落位区块
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BosSection {
    Utility, // 汇流前 (PRE COMBINE)
    Battery, // 电池侧 (ESS)
    Backup,  // 备电负载子面板 (ESS)
    PostSms, // SMS 之后 (POST COMBINE)
    Combine, // 多系统合并后 (POST COMBINE 槽位)
}

impl fmt::Display for BosSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BosSection::Utility => write!(f, "UTILITY"),
            BosSection::Battery => write!(f, "BATTERY"),
            BosSection::Backup => write!(f, "BACKUP"),
            BosSection::PostSms => write!(f, "POST_SMS"),
            BosSection::Combine => write!(f, "COMBINE"),
        }
    }
}

// ==========================================
// 匹配置信度 (Confidence)
// ==========================================
// 排序: Exact < High < Medium < Low（越靠前越可信）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Exact,
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Exact => write!(f, "EXACT"),
            Confidence::High => write!(f, "HIGH"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::Low => write!(f, "LOW"),
        }
    }
}

// ==========================================
// 特殊设备 (Special Equipment)
// ==========================================
// 合并落点选项由设备标签驱动，而不是在业务逻辑中散落字符串判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialEquipment {
    SolarEdgeBackupInterface,
    TeslaPowerwall3,
    SolArk,
}

impl SpecialEquipment {
    /// 识别逆变器侧的特殊设备
    pub fn classify_inverter(make: Option<&str>, model: Option<&str>) -> Option<Self> {
        let model = model.unwrap_or_default().to_lowercase();
        if model.contains("powerwall 3") || model.contains("powerwall+") {
            return Some(SpecialEquipment::TeslaPowerwall3);
        }

        let make = make.unwrap_or_default().to_lowercase();
        if make.contains("sol-ark") || make.contains("solark") {
            return Some(SpecialEquipment::SolArk);
        }

        None
    }

    /// 识别 SMS 侧的特殊设备
    pub fn classify_sms(model: Option<&str>) -> Option<Self> {
        let model = model.unwrap_or_default().to_lowercase();
        if model.contains("backup interface") {
            Some(SpecialEquipment::SolarEdgeBackupInterface)
        } else {
            None
        }
    }

    /// 合并落点下拉选项中的显示名称
    pub fn combine_label(self) -> &'static str {
        match self {
            SpecialEquipment::SolarEdgeBackupInterface => "SolarEdge Backup Interface",
            SpecialEquipment::TeslaPowerwall3 => "Tesla PowerWall 3",
            SpecialEquipment::SolArk => "Sol-Ark",
        }
    }
}

impl fmt::Display for SpecialEquipment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.combine_label())
    }
}

// ==========================================
// Post Combine BOS 类型 (Type 1-3)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostCombineType {
    Type1,
    Type2,
    Type3,
}

impl PostCombineType {
    pub const ALL: [PostCombineType; 3] =
        [PostCombineType::Type1, PostCombineType::Type2, PostCombineType::Type3];

    pub fn index(self) -> u8 {
        match self {
            PostCombineType::Type1 => 1,
            PostCombineType::Type2 => 2,
            PostCombineType::Type3 => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(PostCombineType::Type1),
            2 => Some(PostCombineType::Type2),
            3 => Some(PostCombineType::Type3),
            _ => None,
        }
    }
}

impl fmt::Display for PostCombineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TYPE_{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_number_bounds() {
        assert!(SystemNumber::new(0).is_err());
        assert!(SystemNumber::new(5).is_err());
        assert_eq!(SystemNumber::new(3).unwrap().prefix(), "sys3_");
    }

    #[test]
    fn test_system_number_serde_rejects_out_of_range() {
        let ok: SystemNumber = serde_json::from_str("2").unwrap();
        assert_eq!(ok.get(), 2);
        assert!(serde_json::from_str::<SystemNumber>("9").is_err());
    }

    #[test]
    fn test_inverter_classification() {
        assert_eq!(
            InverterType::classify(Some("Sol-Ark"), Some("15K-2P-N")),
            Some(InverterType::Hybrid)
        );
        assert_eq!(
            InverterType::classify(Some("Tesla"), Some("Powerwall 3")),
            Some(InverterType::GridFormingFollowing)
        );
        assert_eq!(
            InverterType::classify(Some("Enphase"), Some("IQ8PLUS-72-2-US")),
            Some(InverterType::GridFollowing)
        );
        assert_eq!(InverterType::classify(None, None), None);
    }

    #[test]
    fn test_special_equipment_lookup() {
        assert_eq!(
            SpecialEquipment::classify_inverter(Some("Tesla"), Some("PowerWall 3")),
            Some(SpecialEquipment::TeslaPowerwall3)
        );
        assert_eq!(
            SpecialEquipment::classify_inverter(Some("SolArk"), Some("12K")),
            Some(SpecialEquipment::SolArk)
        );
        assert_eq!(
            SpecialEquipment::classify_sms(Some("SolarEdge Backup Interface")),
            Some(SpecialEquipment::SolarEdgeBackupInterface)
        );
        assert_eq!(SpecialEquipment::classify_inverter(Some("Enphase"), Some("IQ8")), None);
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Exact < Confidence::High);
        assert!(Confidence::Medium < Confidence::Low);
    }

    #[test]
    fn test_backup_option_parsing() {
        assert_eq!(BackupOption::from_field(Some("Whole Home")), BackupOption::WholeHome);
        assert_eq!(BackupOption::from_field(Some("None")), BackupOption::NoBackup);
        assert_eq!(BackupOption::from_field(None), BackupOption::NoBackup);
    }
}
