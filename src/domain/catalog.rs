// ==========================================
// 光伏 BOS 配置引擎 - 设备目录实体
// ==========================================

use serde::{Deserialize, Serialize};

/// BOS 设备目录条目（设备类型使用标准名称）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub equipment_type: String,
    pub make: String,
    pub model: String,
    /// 额定电流（A）；"N/A" 类条目为 None
    pub amp: Option<u32>,
}

/// 公司偏好设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredEquipment {
    pub equipment_type: String,
    pub make: String,
    pub model: String,
    pub amp_rating: Option<String>,
    pub is_default: bool,
}
