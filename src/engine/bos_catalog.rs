// ==========================================
// 光伏 BOS 配置引擎 - BOS 设备目录
// ==========================================
// 职责: 设备目录加载 + 电力公司术语翻译 + 自动选型
// 输入: data/bos_equipment_catalog.csv（type,make,model,amp）
// 说明: 目录只使用标准设备名称；电力公司专有名称在此翻译
// ==========================================

use crate::domain::catalog::{CatalogEntry, PreferredEquipment};
use crate::engine::error::BosResult;
use std::collections::BTreeSet;
use std::io::Read;
use tracing::debug;

const BUNDLED_CATALOG: &str = include_str!("../../data/bos_equipment_catalog.csv");

/// 通用（未识别电力公司）术语表键
pub const GENERIC_UTILITY_KEY: &str = "Gen";

// ==========================================
// 电力公司术语表
// ==========================================
// (电力公司键, [(标准名称, 电力公司名称)])
type Vocabulary = (&'static str, &'static [(&'static str, &'static str)]);

static STANDARD_TYPES: &[&str] = &[
    "AC Disconnect",
    "Fused AC Disconnect",
    "Combiner Panel",
    "PV Meter",
    "Bi-Directional Meter",
    "Bi-Directional Meter DER Side Disconnect",
    "Bi-Directional Meter Line Side Disconnect",
    "Junction Box",
];

static TRANSLATIONS: &[Vocabulary] = &[
    (
        GENERIC_UTILITY_KEY,
        &[
            ("AC Disconnect", "AC Disconnect"),
            ("Fused AC Disconnect", "Fused AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "PV Meter"),
            ("Bi-Directional Meter", "Bi-Directional Meter"),
            ("Bi-Directional Meter DER Side Disconnect", "Bi-Directional Meter DER Side Disconnect"),
            ("Bi-Directional Meter Line Side Disconnect", "Bi-Directional Meter Line Side Disconnect"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "APS",
        &[
            ("Fused AC Disconnect", "Utility Disconnect"),
            ("AC Disconnect", "Uni-Directional Meter Line Side Disconnect"),
            ("Combiner Panel", "Dedicated Photovoltaic System Combiner Panel"),
            ("PV Meter", "Uni-Directional Meter"),
            ("Bi-Directional Meter", "Bi-Directional Meter"),
            ("Bi-Directional Meter DER Side Disconnect", "Bi-Directional Meter DER Side Disconnect"),
            ("Bi-Directional Meter Line Side Disconnect", "Bi-Directional Meter Line Side Disconnect"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "SRP",
        &[
            ("AC Disconnect", "DER Meter Disconnect Switch"),
            ("Fused AC Disconnect", "Utility AC Disconnect Switch"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "Dedicated DER Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "TEP",
        &[
            ("AC Disconnect", "Utility DG Disconnect"),
            ("Fused AC Disconnect", "Fused AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "Utility DG Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "TRICO",
        &[
            ("AC Disconnect", "Co-Generation System Utility Disconnect"),
            ("Fused AC Disconnect", "Fused AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "PV Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "UniSource",
        &[
            ("AC Disconnect", "Utility DG Disconnect"),
            ("Fused AC Disconnect", "Fused AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "Utility DG Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "Sulphur Springs Valley Electric Cooperative",
        &[
            ("AC Disconnect", "DG Disconnect Switch"),
            ("Fused AC Disconnect", "Fused AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "PV Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "Xcel Energy",
        &[
            ("AC Disconnect", "Utility PV AC Disconnect"),
            ("Fused AC Disconnect", "Utility PV AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "PV Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
    (
        "Oncor",
        &[
            ("AC Disconnect", "AC Disconnect"),
            ("Fused AC Disconnect", "Fused AC Disconnect"),
            ("Combiner Panel", "Combiner Panel"),
            ("PV Meter", "PV Meter"),
            ("Junction Box", "Junction Box"),
        ],
    ),
];

/// 电力公司全称片段 → 术语表键
static UTILITY_NAME_PATTERNS: &[(&str, &str)] = &[
    ("ARIZONA PUBLIC SERVICE", "APS"),
    ("SALT RIVER", "SRP"),
    ("TUCSON ELECTRIC", "TEP"),
    ("TRICO", "TRICO"),
    ("UNISOURCE", "UniSource"),
    ("SULPHUR SPRINGS", "Sulphur Springs Valley Electric Cooperative"),
    ("XCEL", "Xcel Energy"),
];

/// 解析术语表键
///
/// 顺序: 键名精确匹配（大小写不敏感）→ 括号内缩写 → 全称片段 → Gen
pub fn utility_key(utility_name: Option<&str>) -> &'static str {
    let Some(name) = utility_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return GENERIC_UTILITY_KEY;
    };

    let find_key = |candidate: &str| {
        TRANSLATIONS
            .iter()
            .map(|(key, _)| *key)
            .find(|key| key.eq_ignore_ascii_case(candidate))
    };

    if let Some(key) = find_key(name) {
        return key;
    }

    if let (Some(open), Some(close)) = (name.find('('), name.rfind(')')) {
        if open < close {
            if let Some(key) = find_key(name[open + 1..close].trim()) {
                return key;
            }
        }
    }

    let upper = name.to_uppercase();
    UTILITY_NAME_PATTERNS
        .iter()
        .find(|(pattern, _)| upper.contains(pattern))
        .map(|(_, key)| *key)
        .unwrap_or(GENERIC_UTILITY_KEY)
}

/// 标准名称 → 电力公司名称（无对应条目时原样返回）
pub fn translate_for_utility<'a>(standard_name: &'a str, utility_name: Option<&str>) -> &'a str {
    let key = utility_key(utility_name);
    TRANSLATIONS
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, table)| table.iter().find(|(std, _)| *std == standard_name))
        .map(|(_, translated)| *translated)
        .unwrap_or(standard_name)
}

/// 电力公司名称 → 标准名称
///
/// 标准名称映射到自身；多个电力公司复用同一名称时以表中靠后者为准
pub fn standard_equipment_type(name: &str) -> &str {
    let mut resolved: Option<&'static str> = STANDARD_TYPES
        .iter()
        .copied()
        .find(|std| std.eq_ignore_ascii_case(name));

    for (_, table) in TRANSLATIONS {
        for (std, translated) in table.iter() {
            if translated.eq_ignore_ascii_case(name) {
                resolved = Some(*std);
            }
        }
    }

    resolved.unwrap_or(name)
}

// ==========================================
// CatalogSelection - 选型结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSelection {
    /// 自动选定
    Selected { make: String, model: String, catalog_amp: Option<u32> },
    /// 存在多个候选，需人工选择
    RequiresSelection { available_makes: Vec<String>, available_models: Vec<String> },
    /// 目录中没有该设备类型
    NotInCatalog { standard_type: String },
}

// ==========================================
// BosCatalog - 设备目录
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BosCatalog {
    entries: Vec<CatalogEntry>,
}

impl BosCatalog {
    /// 随程序发布的目录
    pub fn bundled() -> BosResult<Self> {
        Self::from_reader(BUNDLED_CATALOG.as_bytes())
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// 从 CSV 读取（表头: type,make,model,amp）
    pub fn from_reader<R: Read>(reader: R) -> BosResult<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let mut entries = Vec::new();
        for result in reader.records() {
            let record = result?;
            let (Some(equipment_type), Some(make), Some(model)) = (
                Self::get_string_field(&record, 0),
                Self::get_string_field(&record, 1),
                Self::get_string_field(&record, 2),
            ) else {
                debug!(row = ?record.position().map(|p| p.line()), "目录行缺少类型/品牌/型号，跳过");
                continue;
            };
            entries.push(CatalogEntry {
                equipment_type,
                make,
                model,
                amp: Self::get_amp_field(&record, 3),
            });
        }

        debug!(count = entries.len(), "BOS 设备目录加载完成");
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 指定类型（可为电力公司名称）的全部条目
    pub fn entries_for(&self, equipment_type: &str) -> Vec<&CatalogEntry> {
        let standard = standard_equipment_type(equipment_type);
        self.entries
            .iter()
            .filter(|e| e.equipment_type.eq_ignore_ascii_case(standard))
            .collect()
    }

    pub fn contains_type(&self, equipment_type: &str) -> bool {
        !self.entries_for(equipment_type).is_empty()
    }

    /// 可选品牌（可按最小额定电流过滤）
    pub fn available_makes(&self, equipment_type: &str, min_amp: Option<u32>) -> Vec<String> {
        self.entries_for(equipment_type)
            .into_iter()
            .filter(|e| Self::meets_rating(e, min_amp))
            .map(|e| e.make.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 自动选型
    ///
    /// # 参数
    /// - equipment_type: 设备类型（标准或电力公司名称）
    /// - min_amp: 最小额定电流
    /// - preferred: 公司偏好设备
    /// - preferred_make: 配置指定的首选品牌
    ///
    /// # 说明
    /// 候选收窄到满足 min_amp 的最小额定等级后，依次尝试:
    /// 默认偏好 → 唯一偏好 → 首选品牌 → 唯一候选
    pub fn select(
        &self,
        equipment_type: &str,
        min_amp: Option<u32>,
        preferred: &[PreferredEquipment],
        preferred_make: Option<&str>,
    ) -> CatalogSelection {
        let standard = standard_equipment_type(equipment_type);
        let all = self.entries_for(standard);
        if all.is_empty() {
            return CatalogSelection::NotInCatalog {
                standard_type: standard.to_string(),
            };
        }

        let mut candidates: Vec<&CatalogEntry> =
            all.iter().copied().filter(|e| Self::meets_rating(e, min_amp)).collect();
        if let Some(smallest) = candidates.iter().filter_map(|e| e.amp).min() {
            if min_amp.is_some() {
                candidates.retain(|e| e.amp == Some(smallest));
            }
        }
        candidates.sort_by(|a, b| {
            a.amp
                .cmp(&b.amp)
                .then_with(|| a.make.cmp(&b.make))
                .then_with(|| a.model.cmp(&b.model))
        });

        if candidates.is_empty() {
            return Self::requires_selection(&all);
        }

        let preferred_for_type: Vec<&PreferredEquipment> = preferred
            .iter()
            .filter(|p| standard_equipment_type(&p.equipment_type).eq_ignore_ascii_case(standard))
            .collect();
        let in_candidates = |p: &PreferredEquipment| {
            candidates
                .iter()
                .find(|e| e.make.eq_ignore_ascii_case(&p.make) && e.model.eq_ignore_ascii_case(&p.model))
                .copied()
        };

        // 1. 默认偏好
        if let Some(entry) = preferred_for_type
            .iter()
            .filter(|p| p.is_default)
            .find_map(|p| in_candidates(*p))
        {
            return Self::selected(entry);
        }

        // 2. 唯一偏好
        let preferred_hits: Vec<&CatalogEntry> =
            preferred_for_type.iter().filter_map(|p| in_candidates(*p)).collect();
        if preferred_hits.len() == 1 {
            return Self::selected(preferred_hits[0]);
        }

        // 3. 首选品牌
        let makes: Vec<&str> = preferred_make
            .into_iter()
            .chain(preferred_for_type.iter().map(|p| p.make.as_str()))
            .collect();
        for make in makes {
            if let Some(entry) = candidates.iter().find(|e| e.make.eq_ignore_ascii_case(make)) {
                return Self::selected(entry);
            }
        }

        // 4. 唯一候选
        if candidates.len() == 1 {
            return Self::selected(candidates[0]);
        }

        Self::requires_selection(&candidates)
    }

    fn selected(entry: &CatalogEntry) -> CatalogSelection {
        CatalogSelection::Selected {
            make: entry.make.clone(),
            model: entry.model.clone(),
            catalog_amp: entry.amp,
        }
    }

    fn requires_selection(entries: &[&CatalogEntry]) -> CatalogSelection {
        let makes: BTreeSet<String> = entries.iter().map(|e| e.make.clone()).collect();
        let models: BTreeSet<String> = entries.iter().map(|e| e.model.clone()).collect();
        CatalogSelection::RequiresSelection {
            available_makes: makes.into_iter().collect(),
            available_models: models.into_iter().collect(),
        }
    }

    fn meets_rating(entry: &CatalogEntry, min_amp: Option<u32>) -> bool {
        match (min_amp, entry.amp) {
            (None, _) => true,
            (Some(min), Some(amp)) => amp >= min,
            (Some(_), None) => false,
        }
    }

    // ==========================================
    // 辅助方法: CSV字段解析
    // ==========================================

    fn get_string_field(record: &csv::StringRecord, index: usize) -> Option<String> {
        record
            .get(index)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// "30" / "60A" / "100 Amps" → 数值；"N/A" → None
    fn get_amp_field(record: &csv::StringRecord, index: usize) -> Option<u32> {
        let raw = record.get(index)?.trim();
        let digits: String = raw
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preferred(equipment_type: &str, make: &str, model: &str, is_default: bool) -> PreferredEquipment {
        PreferredEquipment {
            equipment_type: equipment_type.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            amp_rating: None,
            is_default,
        }
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = BosCatalog::bundled().unwrap();
        assert!(catalog.len() > 50);
        assert!(catalog.contains_type("Utility Disconnect"));
        assert!(!catalog.contains_type("Transfer Switch"));
        assert!(catalog
            .entries_for("System Controller")
            .iter()
            .all(|e| e.amp.is_none()));
    }

    #[test]
    fn test_vocabulary_round_trip() {
        assert_eq!(translate_for_utility("Fused AC Disconnect", Some("APS")), "Utility Disconnect");
        assert_eq!(
            translate_for_utility("AC Disconnect", Some("Salt River Project (SRP)")),
            "DER Meter Disconnect Switch"
        );
        assert_eq!(translate_for_utility("PV Meter", Some("Unknown Co-op")), "PV Meter");
        assert_eq!(standard_equipment_type("Uni-Directional Meter"), "PV Meter");
        assert_eq!(standard_equipment_type("Utility DG Disconnect"), "AC Disconnect");
        assert_eq!(standard_equipment_type("Transfer Switch"), "Transfer Switch");
    }

    #[test]
    fn test_utility_key_resolution() {
        assert_eq!(utility_key(Some("aps")), "APS");
        assert_eq!(utility_key(Some("Arizona Public Service Co")), "APS");
        assert_eq!(utility_key(Some("Tucson Electric Power (TEP)")), "TEP");
        assert_eq!(utility_key(Some("  ")), GENERIC_UTILITY_KEY);
        assert_eq!(utility_key(None), GENERIC_UTILITY_KEY);
    }

    #[test]
    fn test_select_narrows_to_smallest_sufficient_rating() {
        let catalog = BosCatalog::bundled().unwrap();
        let selection = catalog.select("Uni-Directional Meter Line Side Disconnect", Some(40), &[], Some("SIEMENS"));
        match selection {
            CatalogSelection::Selected { make, catalog_amp, .. } => {
                assert_eq!(make, "SIEMENS");
                assert_eq!(catalog_amp, Some(60));
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_select_prefers_company_default() {
        let catalog = BosCatalog::from_entries(vec![
            CatalogEntry {
                equipment_type: "AC Disconnect".to_string(),
                make: "EATON".to_string(),
                model: "DG222URB".to_string(),
                amp: Some(60),
            },
            CatalogEntry {
                equipment_type: "AC Disconnect".to_string(),
                make: "SIEMENS".to_string(),
                model: "LNF222R".to_string(),
                amp: Some(60),
            },
        ]);

        let prefs = vec![
            preferred("AC Disconnect", "EATON", "DG222URB", false),
            preferred("AC Disconnect", "SIEMENS", "LNF222R", true),
        ];
        let selection = catalog.select("AC Disconnect", Some(30), &prefs, None);
        assert!(matches!(selection, CatalogSelection::Selected { ref make, .. } if make == "SIEMENS"));

        let ambiguous = catalog.select("AC Disconnect", Some(30), &[], None);
        match ambiguous {
            CatalogSelection::RequiresSelection { available_makes, .. } => {
                assert_eq!(available_makes, vec!["EATON".to_string(), "SIEMENS".to_string()]);
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_select_reports_missing_type() {
        let catalog = BosCatalog::bundled().unwrap();
        assert_eq!(
            catalog.select("Automatic Disconnect Switch", Some(60), &[], None),
            CatalogSelection::NotInCatalog {
                standard_type: "Automatic Disconnect Switch".to_string()
            }
        );
    }
}
