// ==========================================
// 光伏 BOS 配置引擎 - 系统汇流箱与 Post Combine BOS
// ==========================================

use crate::domain::field::ProjectRecord;
use serde::{Deserialize, Serialize};

/// 系统汇流箱字段前缀
pub const COMBINER_PANEL_PREFIX: &str = "system_combiner_panel_1_";

/// 汇流箱写入 Post Combine 槽位 1 时使用的设备类型
pub const POSITION_COMBINER_PANEL: &str = "Position Combiner Panel";

/// 默认主开关类型（主母排无主断路器）
pub const DEFAULT_MAIN_BREAKER: &str = "mlo";

// ==========================================
// SystemCombinerPanel - 系统汇流箱
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemCombinerPanel {
    pub make: Option<String>,
    pub model: Option<String>,
    pub bus_amp_rating: Option<String>,
    pub main_breaker: Option<String>,
    pub breaker_rating: Option<String>,
    pub is_new: bool,
}

impl SystemCombinerPanel {
    /// 从项目字段读取汇流箱；品牌与型号均缺失时返回 None
    pub fn from_record(record: &ProjectRecord) -> Option<Self> {
        let key = |suffix: &str| format!("{}{}", COMBINER_PANEL_PREFIX, suffix);

        let make = record.text(&key("make")).map(str::to_string);
        let model = record.text(&key("model")).map(str::to_string);
        if make.is_none() && model.is_none() {
            return None;
        }

        Some(Self {
            make,
            model,
            bus_amp_rating: record.text_lossy(&key("amp_rating")),
            main_breaker: Some(
                record
                    .text(&key("main_breaker"))
                    .unwrap_or(DEFAULT_MAIN_BREAKER)
                    .to_string(),
            ),
            breaker_rating: record.text_lossy(&key("breakerrating")),
            is_new: false,
        })
    }

    pub fn is_present(&self) -> bool {
        self.make.is_some() || self.model.is_some()
    }
}

// ==========================================
// PostCombineBosEntry - Post Combine BOS 行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCombineBosEntry {
    pub equipment_type: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub amp_rating: Option<String>,
    pub is_new: bool,
}

impl PostCombineBosEntry {
    pub fn new(equipment_type: impl Into<String>) -> Self {
        Self {
            equipment_type: equipment_type.into(),
            make: None,
            model: None,
            amp_rating: None,
            is_new: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combiner_presence_requires_make_or_model() {
        let record = ProjectRecord::from_value(json!({
            "system_combiner_panel_1_amp_rating": "200",
        }));
        assert!(SystemCombinerPanel::from_record(&record).is_none());

        let record = ProjectRecord::from_value(json!({
            "system_combiner_panel_1_make": "Square D",
            "system_combiner_panel_1_amp_rating": 200,
        }));
        let panel = SystemCombinerPanel::from_record(&record).unwrap();
        assert!(panel.is_present());
        assert_eq!(panel.bus_amp_rating.as_deref(), Some("200"));
        assert_eq!(panel.main_breaker.as_deref(), Some("mlo"));
    }
}
