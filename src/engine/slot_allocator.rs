// ==========================================
// 光伏 BOS 配置引擎 - Post Combine BOS 槽位分配
// ==========================================
// 红线: 每个项目最多 3 个 Post Combine 槽位
// 红线: 有系统汇流箱时，汇流箱占用槽位 1，Type 1/2 顺延到 2/3，Type 3 不可用
// 规则: type1_slot + 1 == type2_slot
// ==========================================

use crate::domain::combiner::{
    PostCombineBosEntry, SystemCombinerPanel, COMBINER_PANEL_PREFIX, DEFAULT_MAIN_BREAKER,
    POSITION_COMBINER_PANEL,
};
use crate::domain::field::{FieldPayload, ProjectRecord};
use crate::domain::types::PostCombineType;
use crate::engine::error::{BosError, BosResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Post Combine 槽位数
pub const POST_COMBINE_SLOTS: u8 = 3;

/// 槽位 1 中视为系统汇流箱的设备类型
const COMBINER_SLOT_TYPES: [&str; 3] = [
    POSITION_COMBINER_PANEL,
    "Dedicated Photovoltaic System Combiner Panel",
    "Combiner Panel",
];

/// 加载时忽略的设备类型（属于汇流前区块）
const IGNORED_POST_COMBINE_TYPES: [&str; 1] = ["String Combiner Panel"];

/// Post Combine 槽位字段前缀
pub fn post_combine_prefix(slot: u8) -> String {
    format!("post_sms_bos_sys1_type{}_", slot)
}

// ==========================================
// SlotAllocation - 槽位分配结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAllocation {
    pub type1_slot: u8,
    pub type2_slot: u8,
    pub type3_available: bool,
}

impl SlotAllocation {
    /// 按系统汇流箱是否存在计算槽位
    pub fn for_combiner(has_combiner: bool) -> Self {
        if has_combiner {
            Self {
                type1_slot: 2,
                type2_slot: 3,
                type3_available: false,
            }
        } else {
            Self {
                type1_slot: 1,
                type2_slot: 2,
                type3_available: true,
            }
        }
    }

    pub fn from_record(record: &ProjectRecord) -> Self {
        Self::for_combiner(has_system_combiner_panel(record))
    }

    /// 类型 → 槽位
    ///
    /// # 返回
    /// - Err(SlotUnavailable): 有汇流箱时请求 Type 3
    pub fn slot_for(&self, kind: PostCombineType) -> BosResult<u8> {
        match kind {
            PostCombineType::Type1 => Ok(self.type1_slot),
            PostCombineType::Type2 => Ok(self.type2_slot),
            PostCombineType::Type3 if self.type3_available => Ok(3),
            PostCombineType::Type3 => Err(BosError::SlotUnavailable { kind }),
        }
    }

    /// 槽位 → 类型（汇流箱槽位返回 None）
    pub fn type_at(&self, slot: u8) -> Option<PostCombineType> {
        PostCombineType::ALL
            .into_iter()
            .find(|kind| self.slot_for(*kind).ok() == Some(slot))
    }

    pub fn available_types(&self) -> Vec<PostCombineType> {
        PostCombineType::ALL
            .into_iter()
            .filter(|kind| self.slot_for(*kind).is_ok())
            .collect()
    }
}

/// 系统汇流箱是否存在
///
/// # 说明
/// 汇流箱字段有品牌/型号，或槽位 1 登记为汇流箱。
/// 槽位 1 中由之前自动填充写入的电表等设备不算。
pub fn has_system_combiner_panel(record: &ProjectRecord) -> bool {
    if SystemCombinerPanel::from_record(record).is_some() {
        return true;
    }
    record
        .text(&format!("{}equipment_type", post_combine_prefix(1)))
        .map(|t| COMBINER_SLOT_TYPES.iter().any(|c| c.eq_ignore_ascii_case(t)))
        .unwrap_or(false)
}

/// 写入单个 Post Combine BOS
///
/// # 返回
/// - Err(SlotUnavailable): 有汇流箱时写 Type 3（不产生任何字段）
pub fn post_combine_payload(
    kind: PostCombineType,
    entry: &PostCombineBosEntry,
    has_combiner: bool,
) -> BosResult<FieldPayload> {
    let allocation = SlotAllocation::for_combiner(has_combiner);
    let slot = allocation.slot_for(kind).inspect_err(|_| {
        warn!(kind = %kind, "系统汇流箱占用槽位 1，拒绝写入 Type 3");
    })?;
    Ok(slot_payload(slot, entry))
}

/// 指定槽位的字段
pub fn slot_payload(slot: u8, entry: &PostCombineBosEntry) -> FieldPayload {
    let prefix = post_combine_prefix(slot);
    let mut payload = FieldPayload::new();
    payload
        .set(format!("{}equipment_type", prefix), entry.equipment_type.clone())
        .set_opt(format!("{}make", prefix), entry.make.clone())
        .set_opt(format!("{}model", prefix), entry.model.clone())
        .set_opt(format!("{}amp_rating", prefix), entry.amp_rating.clone())
        .set(format!("{}existing", prefix), !entry.is_new);
    payload
}

/// 清空指定槽位
pub fn clear_slot_payload(slot: u8) -> FieldPayload {
    let prefix = post_combine_prefix(slot);
    let mut payload = FieldPayload::new();
    for suffix in ["equipment_type", "make", "model", "amp_rating", "existing"] {
        payload.clear(format!("{}{}", prefix, suffix));
    }
    payload
}

/// 保存系统汇流箱
///
/// 写入 system_combiner_panel_1_*，并以 "Position Combiner Panel" 镜像到槽位 1
pub fn system_combiner_panel_payload(panel: &SystemCombinerPanel) -> FieldPayload {
    let key = |suffix: &str| format!("{}{}", COMBINER_PANEL_PREFIX, suffix);
    let mut payload = FieldPayload::new();
    payload
        .set_opt(key("make"), panel.make.clone())
        .set_opt(key("model"), panel.model.clone())
        .set_opt(key("amp_rating"), panel.bus_amp_rating.clone())
        .set(
            key("main_breaker"),
            panel
                .main_breaker
                .clone()
                .unwrap_or_else(|| DEFAULT_MAIN_BREAKER.to_string()),
        )
        .set_opt(key("breakerrating"), panel.breaker_rating.clone());

    let mirror = PostCombineBosEntry {
        equipment_type: POSITION_COMBINER_PANEL.to_string(),
        make: panel.make.clone(),
        model: panel.model.clone(),
        amp_rating: panel.bus_amp_rating.clone(),
        is_new: panel.is_new,
    };
    payload.merge(slot_payload(1, &mirror));
    payload
}

/// 读取已保存的 Post Combine BOS（按当前汇流箱状态的槽位）
pub fn load_post_combine_bos(record: &ProjectRecord) -> Vec<(PostCombineType, PostCombineBosEntry)> {
    let allocation = SlotAllocation::from_record(record);
    allocation
        .available_types()
        .into_iter()
        .filter_map(|kind| {
            let slot = allocation.slot_for(kind).ok()?;
            let prefix = post_combine_prefix(slot);
            let equipment_type = record.text(&format!("{}equipment_type", prefix))?;
            if IGNORED_POST_COMBINE_TYPES
                .iter()
                .any(|t| t.eq_ignore_ascii_case(equipment_type))
            {
                return None;
            }
            Some((
                kind,
                PostCombineBosEntry {
                    equipment_type: equipment_type.to_string(),
                    make: record.text(&format!("{}make", prefix)).map(str::to_string),
                    model: record.text(&format!("{}model", prefix)).map(str::to_string),
                    amp_rating: record.text_lossy(&format!("{}amp_rating", prefix)),
                    is_new: !record.is_true(&format!("{}existing", prefix)),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_allocation_shifts_with_combiner() {
        for has in [false, true] {
            let a = SlotAllocation::for_combiner(has);
            assert_eq!(a.type1_slot + 1, a.type2_slot);
            assert_eq!(a.type2_slot == 3, has);
            assert_eq!(a.type3_available, !has);
        }
    }

    #[test]
    fn test_type3_rejected_with_combiner() {
        let entry = PostCombineBosEntry::new("Utility Disconnect");
        let err = post_combine_payload(PostCombineType::Type3, &entry, true).unwrap_err();
        assert!(matches!(err, BosError::SlotUnavailable { kind: PostCombineType::Type3 }));

        let payload = post_combine_payload(PostCombineType::Type3, &entry, false).unwrap();
        assert!(payload.contains_key("post_sms_bos_sys1_type3_equipment_type"));
    }

    #[test]
    fn test_type1_lands_in_slot2_with_combiner() {
        let mut entry = PostCombineBosEntry::new("Uni-Directional Meter");
        entry.amp_rating = Some("63".to_string());
        let payload = post_combine_payload(PostCombineType::Type1, &entry, true).unwrap();
        assert_eq!(
            payload.get("post_sms_bos_sys1_type2_equipment_type"),
            Some(&json!("Uni-Directional Meter"))
        );
        assert_eq!(payload.get("post_sms_bos_sys1_type2_existing"), Some(&json!(false)));
        assert!(!payload.contains_key("post_sms_bos_sys1_type1_equipment_type"));
    }

    #[test]
    fn test_meter_in_slot1_is_not_a_combiner() {
        let record = ProjectRecord::from_value(json!({
            "post_sms_bos_sys1_type1_equipment_type": "Uni-Directional Meter",
        }));
        assert!(!has_system_combiner_panel(&record));

        let record = ProjectRecord::from_value(json!({
            "post_sms_bos_sys1_type1_equipment_type": "Position Combiner Panel",
        }));
        assert!(has_system_combiner_panel(&record));
    }

    #[test]
    fn test_combiner_payload_mirrors_slot1() {
        let panel = SystemCombinerPanel {
            make: Some("Square D".to_string()),
            model: Some("QO142L225PG".to_string()),
            bus_amp_rating: Some("225".to_string()),
            main_breaker: None,
            breaker_rating: None,
            is_new: true,
        };
        let payload = system_combiner_panel_payload(&panel);
        assert_eq!(payload.get("system_combiner_panel_1_main_breaker"), Some(&json!("mlo")));
        assert_eq!(
            payload.get("post_sms_bos_sys1_type1_equipment_type"),
            Some(&json!(POSITION_COMBINER_PANEL))
        );
        assert_eq!(payload.get("post_sms_bos_sys1_type1_existing"), Some(&json!(false)));
    }

    #[test]
    fn test_load_reads_shifted_slots() {
        let record = ProjectRecord::from_value(json!({
            "system_combiner_panel_1_make": "Square D",
            "post_sms_bos_sys1_type1_equipment_type": "Position Combiner Panel",
            "post_sms_bos_sys1_type2_equipment_type": "Uni-Directional Meter",
            "post_sms_bos_sys1_type2_amp_rating": 63,
            "post_sms_bos_sys1_type3_equipment_type": "String Combiner Panel",
        }));
        let loaded = load_post_combine_bos(&record);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, PostCombineType::Type1);
        assert_eq!(loaded[0].1.amp_rating.as_deref(), Some("63"));
        assert!(loaded[0].1.is_new);
    }
}
