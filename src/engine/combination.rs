// ==========================================
// 光伏 BOS 配置引擎 - 多系统合并规则
// ==========================================
// 职责: 合并标记解析、合并资格校验、落点选项、合并后 BOS 清单改写
// 规则: 全新逆变器 → 共享电表 + 共享 Utility Disconnect（汇总输出）
// 规则: 新旧混合 → 各系统保留电表 + 线侧隔离开关，另加共享 Utility Disconnect
// 红线: 合并额定电流 = ceil(Σ 输出 × 1.25)，先求和再取整
// ==========================================

use crate::domain::bos::{BosEquipmentItem, ConfigurationMatch};
use crate::domain::equipment::SystemEquipment;
use crate::domain::field::{FieldPayload, ProjectRecord};
use crate::domain::types::{BosSection, PostCombineType, SpecialEquipment, SystemNumber};
use crate::engine::detectors::output_warning;
use crate::engine::sizing::{combined_calculation, combined_required_amps, required_amps, single_calculation};
use crate::i18n;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

// ===== 持久化字段 =====
pub const FIELD_COMBINE_SYSTEMS: &str = "ele_combine_systems";
pub const FIELD_COMBINE_ACTIVE_SYSTEMS: &str = "ele_combine_active_systems";
pub const FIELD_COMBINE_POSITIONS: &str = "ele_combine_positions";
pub const FIELD_COMBINE_DESC: &str = "ele_combine_system_desc";

/// 未合并时的描述
pub const NO_COMBINE_DESC: &str = "No Combine";

/// 无特殊设备时的唯一落点选项
pub const COMBINER_PANEL_OPTION: &str = "Combiner Panel";

const METER_TYPE: &str = "Uni-Directional Meter";
const LINE_SIDE_DISCONNECT_TYPE: &str = "Uni-Directional Meter Line Side Disconnect";
const UTILITY_DISCONNECT_TYPE: &str = "Utility Disconnect";
const COMBINED_LABEL: &str = "Combined Inverter Output";

/// 已知的逆变器最大输出（未知或非正数为 None）
fn known_output(equipment: &SystemEquipment) -> Option<f64> {
    equipment.inverter_max_output_amps.filter(|v| *v > 0.0)
}

fn landing_key(system: SystemNumber) -> String {
    format!("{}landing_destination", system.prefix())
}

// ==========================================
// CombineSettings - 合并标记
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineSettings {
    pub combine: bool,
    /// ele_combine_active_systems；缺失时为 None
    pub active_systems: Option<Vec<SystemNumber>>,
}

impl CombineSettings {
    /// 读取合并标记
    ///
    /// # 说明
    /// - 优先 ele_combine_systems
    /// - 缺失时兼容旧字段 ele_combine_positions（JSON 的 combine_systems，或旧版描述文本）
    /// - 活动系统列表中的非法编号被忽略
    pub fn from_record(record: &ProjectRecord) -> Self {
        let combine = record
            .flag(FIELD_COMBINE_SYSTEMS)
            .unwrap_or_else(|| Self::legacy_flag(record));

        let active_systems = record.text_lossy(FIELD_COMBINE_ACTIVE_SYSTEMS).map(|raw| {
            let mut systems: Vec<SystemNumber> = raw
                .split(',')
                .filter_map(|s| s.trim().parse::<u8>().ok())
                .filter_map(|n| SystemNumber::new(n).ok())
                .collect();
            systems.sort();
            systems.dedup();
            systems
        });

        Self {
            combine,
            active_systems,
        }
    }

    fn legacy_flag(record: &ProjectRecord) -> bool {
        let Some(raw) = record.text(FIELD_COMBINE_POSITIONS) else {
            return false;
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => obj
                .get("combine_systems")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Ok(_) => false,
            // 旧版直接保存描述文本，例如 "Combine System 1 & 2"
            Err(_) => raw.to_ascii_lowercase().starts_with("combine"),
        }
    }

    /// 系统是否参与合并（未指定列表时全部参与）
    pub fn includes(&self, system: SystemNumber) -> bool {
        self.active_systems
            .as_ref()
            .map(|list| list.contains(&system))
            .unwrap_or(true)
    }
}

// ==========================================
// 合并结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombineMode {
    AllNew, // 全部为新装逆变器
    Mixed,  // 新旧混合
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationOutcome {
    pub matches: Vec<ConfigurationMatch>,
    /// None: 未触发合并规则
    pub mode: Option<CombineMode>,
    pub participants: Vec<SystemNumber>,
    pub combined_amps: Option<u32>,
}

impl CombinationOutcome {
    fn unchanged(matches: Vec<ConfigurationMatch>) -> Self {
        Self {
            matches,
            mode: None,
            participants: Vec::new(),
            combined_amps: None,
        }
    }
}

/// 应用合并规则
///
/// # 参数
/// - matches: 每个系统的最佳匹配
/// - equipment: 提取器输出（用于输出电流与新旧判定）
/// - settings: 合并标记
///
/// # 返回
/// 改写后的匹配列表；不满足条件时原样返回
///
/// # 说明
/// - 多系统配置自带合并方案，不参与本规则
/// - Combine 区块设备的 position 为 Post Combine Type 序号，槽位由写入器按汇流箱状态分配
#[instrument(skip_all, fields(matches = matches.len(), combine = settings.combine))]
pub fn apply_combination_rules(
    mut matches: Vec<ConfigurationMatch>,
    equipment: &[SystemEquipment],
    settings: &CombineSettings,
) -> CombinationOutcome {
    if !settings.combine {
        return CombinationOutcome::unchanged(matches);
    }

    let mut participants: Vec<SystemNumber> = matches
        .iter()
        .filter(|m| !m.is_multi_system())
        .map(|m| m.system)
        .filter(|s| settings.includes(*s))
        .filter(|s| equipment.iter().any(|e| e.system == *s))
        .collect();
    participants.sort();
    participants.dedup();

    if participants.len() < 2 {
        debug!(participants = participants.len(), "参与合并的系统不足 2 个，跳过合并规则");
        return CombinationOutcome::unchanged(matches);
    }

    let participant_eq: Vec<&SystemEquipment> = participants
        .iter()
        .filter_map(|s| equipment.iter().find(|e| e.system == *s))
        .collect();
    // 任一参与系统输出未知时，共享设备不派生额定电流
    let outputs: Option<Vec<f64>> = participant_eq.iter().map(|e| known_output(e)).collect();
    let combined = outputs.as_ref().map(|outputs| {
        let amps = combined_required_amps(outputs);
        (amps, combined_calculation(outputs, amps))
    });
    let combined_amps = combined.as_ref().map(|(amps, _)| *amps);

    let mode = if participant_eq.iter().all(|e| e.is_new_inverter()) {
        CombineMode::AllNew
    } else {
        CombineMode::Mixed
    };
    let first = participants[0];
    let participant_list = participants
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    for m in matches.iter_mut().filter(|m| participants.contains(&m.system)) {
        m.bos_equipment.retain(|item| item.section != BosSection::Utility);
        let own = participant_eq.iter().find(|e| e.system == m.system);
        if let Some(warning) = own.and_then(|e| output_warning(e)) {
            if !m.warnings.contains(&warning) {
                m.warnings.push(warning);
            }
        }

        if mode == CombineMode::Mixed {
            let output = own.and_then(|e| known_output(e));
            for (position, equipment_type) in [(1, METER_TYPE), (2, LINE_SIDE_DISCONNECT_TYPE)] {
                let item = BosEquipmentItem::new(m.system, BosSection::Utility, position, equipment_type);
                m.bos_equipment.push(match output {
                    Some(output) => {
                        let amps = required_amps(output);
                        item.sized("Inverter Output", single_calculation(output, amps, "Combined System"), amps)
                    }
                    None => item,
                });
            }
        }

        if m.system == first {
            let shared: &[(PostCombineType, &str)] = match mode {
                CombineMode::AllNew => &[
                    (PostCombineType::Type1, METER_TYPE),
                    (PostCombineType::Type2, UTILITY_DISCONNECT_TYPE),
                ],
                CombineMode::Mixed => &[(PostCombineType::Type1, UTILITY_DISCONNECT_TYPE)],
            };
            for (kind, equipment_type) in shared {
                let item = BosEquipmentItem::new(first, BosSection::Combine, kind.index(), *equipment_type);
                m.bos_equipment.push(match &combined {
                    Some((amps, calc)) => item.sized(COMBINED_LABEL, calc.clone(), *amps),
                    None => item,
                });
            }
            if combined.is_none() {
                m.warnings.push(format!(
                    "合并系统 {} 中有逆变器最大输出未知，共享 BOS 额定电流需人工确认",
                    participant_list
                ));
            }
        }

        m.notes.push(match &combined {
            Some((_, calc)) => format!("合并系统 {}: {}", participant_list, calc),
            None => format!("合并系统 {}: 额定电流待确认", participant_list),
        });
    }

    info!(
        mode = ?mode,
        participants = participants.len(),
        combined_amps = ?combined_amps,
        "已应用多系统合并规则"
    );

    CombinationOutcome {
        matches,
        mode: Some(mode),
        participants,
        combined_amps,
    }
}

// ==========================================
// 合并资格校验
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineEligibility {
    pub valid: bool,
    pub errors: Vec<String>,
    pub active_systems: Vec<SystemNumber>,
}

/// 校验项目是否可以合并
///
/// # 说明
/// - 活动系统: 有光伏组件、有逆变器品牌+型号，或标记为纯储能
/// - 有光伏但未选逆变器的系统报错
/// - 活动系统少于 2 个报错
pub fn validate_combine_eligibility(record: &ProjectRecord) -> CombineEligibility {
    let mut errors = Vec::new();
    let mut active_systems = Vec::new();

    for system in SystemNumber::ALL {
        let f = |suffix: &str| format!("{}{}", system.prefix(), suffix);
        let has_solar = ["solar_panel_make", "solar_panel_model", "solar_panel_qty"]
            .iter()
            .any(|s| record.is_present(&f(s)));
        let has_inverter = record.is_present(&f("micro_inverter_make"))
            && record.is_present(&f("micro_inverter_model"));
        let battery_only = record.flag(&f("batteryonly")) == Some(true);

        if !(has_solar || has_inverter || battery_only) {
            continue;
        }
        active_systems.push(system);
        if has_solar && !has_inverter {
            errors.push(i18n::t_with_args(
                "bos.combine.needs_inverter",
                &[("system", system.to_string().as_str())],
            ));
        }
    }

    if active_systems.len() < 2 {
        errors.push(i18n::t("bos.combine.requires_two"));
    }

    CombineEligibility {
        valid: errors.is_empty(),
        errors,
        active_systems,
    }
}

// ==========================================
// 合并落点选项
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineOption {
    pub label: String,
    pub value: String,
}

impl CombineOption {
    fn new(label: String) -> Self {
        Self {
            value: label.clone(),
            label,
        }
    }
}

/// 生成合并落点选项
///
/// 顺序: SolarEdge Backup Interface → Tesla PowerWall 3 → Sol-Ark；
/// 同类设备出现在多个系统时标签追加 " - Sys N"；均未识别时只有 "Combiner Panel"
pub fn generate_combine_options(
    record: &ProjectRecord,
    active_systems: &[SystemNumber],
) -> Vec<CombineOption> {
    let mut found: HashMap<SpecialEquipment, Vec<SystemNumber>> = HashMap::new();
    for system in active_systems {
        let f = |suffix: &str| format!("{}{}", system.prefix(), suffix);
        if let Some(kind) = SpecialEquipment::classify_sms(record.text(&f("sms_model"))) {
            found.entry(kind).or_default().push(*system);
        }
        if let Some(kind) = SpecialEquipment::classify_inverter(
            record.text(&f("micro_inverter_make")),
            record.text(&f("micro_inverter_model")),
        ) {
            found.entry(kind).or_default().push(*system);
        }
    }

    let mut options = Vec::new();
    for kind in [
        SpecialEquipment::SolarEdgeBackupInterface,
        SpecialEquipment::TeslaPowerwall3,
        SpecialEquipment::SolArk,
    ] {
        let Some(systems) = found.get(&kind) else {
            continue;
        };
        for system in systems {
            let label = if systems.len() > 1 {
                format!("{} - Sys {}", kind.combine_label(), system)
            } else {
                kind.combine_label().to_string()
            };
            options.push(CombineOption::new(label));
        }
    }

    if options.is_empty() {
        options.push(CombineOption::new(COMBINER_PANEL_OPTION.to_string()));
    }
    options
}

// ==========================================
// 合并标记持久化
// ==========================================

/// 合并描述: "Combine 1 & 2" / "Combine 1, 2, 3" / "Combine All"
pub fn combine_description(active_systems: &[SystemNumber]) -> String {
    match active_systems.len() {
        0 | 1 => NO_COMBINE_DESC.to_string(),
        2 => format!("Combine {} & {}", active_systems[0], active_systems[1]),
        n if n >= SystemNumber::MAX as usize => "Combine All".to_string(),
        _ => format!(
            "Combine {}",
            active_systems
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// 保存合并状态
///
/// # 参数
/// - active_systems: 参与合并的系统（升序）
/// - landings: 已确定的落点（系统 → 设备名称）
pub fn combine_systems_payload(
    active_systems: &[SystemNumber],
    landings: &BTreeMap<SystemNumber, String>,
) -> FieldPayload {
    let active_csv = active_systems
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let system_landings: serde_json::Map<String, Value> = landings
        .iter()
        .map(|(s, l)| (format!("system{}", s), Value::String(l.clone())))
        .collect();
    let positions = json!({
        "version": "2.0",
        "combine_systems": true,
        "active_systems": active_systems.iter().map(|s| s.get()).collect::<Vec<_>>(),
        "system_landings": system_landings,
        "timestamp": Utc::now().to_rfc3339(),
    });

    let mut payload = FieldPayload::new();
    payload
        .set(FIELD_COMBINE_POSITIONS, positions.to_string())
        .set(FIELD_COMBINE_SYSTEMS, true)
        .set(FIELD_COMBINE_ACTIVE_SYSTEMS, active_csv)
        .set(FIELD_COMBINE_DESC, combine_description(active_systems));
    for system in active_systems {
        if let Some(landing) = landings.get(system) {
            payload.set(landing_key(*system), landing.clone());
        }
    }
    payload
}

/// 取消合并：清空合并字段与全部落点
pub fn clear_combine_payload() -> FieldPayload {
    let mut payload = FieldPayload::new();
    payload
        .clear(FIELD_COMBINE_POSITIONS)
        .set(FIELD_COMBINE_SYSTEMS, false)
        .clear(FIELD_COMBINE_ACTIVE_SYSTEMS)
        .set(FIELD_COMBINE_DESC, NO_COMBINE_DESC);
    for system in SystemNumber::ALL {
        payload.clear(landing_key(system));
    }
    payload
}
