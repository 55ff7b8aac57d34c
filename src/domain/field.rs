// ==========================================
// 光伏 BOS 配置引擎 - 项目字段记录
// ==========================================
// 职责: 扁平字段记录的统一读取入口
// 红线: "缺失值"只有一种判定规则，且只在此处判定
//   - 键不存在 / JSON null
//   - 字符串 trim 后为 "" / "null" / "undefined"（不区分大小写）
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 判断一个字段值是否为"缺失"
pub fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => {
            let t = s.trim();
            t.is_empty() || t.eq_ignore_ascii_case("null") || t.eq_ignore_ascii_case("undefined")
        }
        Some(_) => false,
    }
}

// ==========================================
// ProjectRecord - 项目扁平字段记录
// ==========================================

/// 项目字段记录（只读视图）
///
/// 所有提取器、匹配器、写入器都通过这里的类型化访问器读取字段，
/// 不直接判断空字符串或 "null"。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRecord {
    fields: Map<String, Value>,
}

impl ProjectRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// 原始值（缺失值返回 None）
    pub fn raw(&self, key: &str) -> Option<&Value> {
        let value = self.fields.get(key);
        if is_absent(value) {
            None
        } else {
            value
        }
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.raw(key).is_some()
    }

    /// 文本值（trim 后）
    ///
    /// 数字和布尔值不视为文本，返回 None
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.raw(key)? {
            Value::String(s) => Some(s.trim()),
            _ => None,
        }
    }

    /// 文本值，数字/布尔值转为字符串
    pub fn text_lossy(&self, key: &str) -> Option<String> {
        match self.raw(key)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// 数值（JSON 数字或可解析的数字字符串）
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.raw(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches(['A', 'a']).trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    /// 数量（缺失或非法时为 0）
    pub fn count(&self, key: &str) -> u32 {
        self.number(key)
            .filter(|v| *v > 0.0)
            .map(|v| v.floor() as u32)
            .unwrap_or(0)
    }

    /// 布尔值
    ///
    /// 支持 true/false、"true"/"false"、"1"/"0"、1/0
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.raw(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// 布尔值为 true
    pub fn is_true(&self, key: &str) -> bool {
        self.flag(key).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// 应用一次部分写入（null 清空字段）
    pub fn apply(&mut self, payload: &FieldPayload) {
        for (key, value) in payload.iter() {
            if value.is_null() {
                self.fields.remove(key);
            } else {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for ProjectRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

// ==========================================
// FieldPayload - 部分写入载荷
// ==========================================

/// 部分写入载荷（按键有序，便于测试与日志对比）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPayload {
    fields: BTreeMap<String, Value>,
}

impl FieldPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// 写入可选文本；None 时不写
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Into<Value>>) -> &mut Self {
        if let Some(v) = value {
            self.fields.insert(key.into(), v.into());
        }
        self
    }

    /// 显式清空字段
    pub fn clear(&mut self, key: impl Into<String>) -> &mut Self {
        self.fields.insert(key.into(), Value::Null);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn merge(&mut self, other: FieldPayload) {
        self.fields.extend(other.fields);
    }

    /// 移除记录中已有非空值的键（跳过已填字段）
    ///
    /// # 返回
    /// 被移除的键
    pub fn retain_missing_in(&mut self, record: &ProjectRecord) -> Vec<String> {
        let skipped: Vec<String> = self
            .fields
            .keys()
            .filter(|k| record.is_present(k))
            .cloned()
            .collect();
        for key in &skipped {
            self.fields.remove(key);
        }
        skipped
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ProjectRecord {
        ProjectRecord::from_value(value)
    }

    #[test]
    fn test_absent_sentinels_are_uniform() {
        let r = record(json!({
            "a": null,
            "b": "",
            "c": "   ",
            "d": "null",
            "e": "Undefined",
            "f": "Enphase",
        }));

        for key in ["a", "b", "c", "d", "e", "missing"] {
            assert!(!r.is_present(key), "{} 应视为缺失", key);
            assert_eq!(r.text(key), None);
        }
        assert_eq!(r.text("f"), Some("Enphase"));
    }

    #[test]
    fn test_number_and_count() {
        let r = record(json!({
            "qty": "12",
            "amps": 32.5,
            "rating": "200A",
            "bad": "abc",
        }));

        assert_eq!(r.count("qty"), 12);
        assert_eq!(r.number("amps"), Some(32.5));
        assert_eq!(r.number("rating"), Some(200.0));
        assert_eq!(r.number("bad"), None);
        assert_eq!(r.count("bad"), 0);
        assert_eq!(r.count("missing"), 0);
    }

    #[test]
    fn test_flag_variants() {
        let r = record(json!({
            "a": true,
            "b": "false",
            "c": 1,
            "d": "yes",
            "e": "maybe",
        }));

        assert_eq!(r.flag("a"), Some(true));
        assert_eq!(r.flag("b"), Some(false));
        assert_eq!(r.flag("c"), Some(true));
        assert_eq!(r.flag("d"), Some(true));
        assert_eq!(r.flag("e"), None);
        assert!(!r.is_true("missing"));
    }

    #[test]
    fn test_payload_retain_missing() {
        let r = record(json!({ "x": "kept", "y": "" }));
        let mut payload = FieldPayload::new();
        payload.set("x", "new").set("y", "filled").set("z", 3);

        let skipped = payload.retain_missing_in(&r);

        assert_eq!(skipped, vec!["x".to_string()]);
        assert!(!payload.contains_key("x"));
        assert_eq!(payload.get("y"), Some(&json!("filled")));
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_apply_payload_clears_null() {
        let mut r = record(json!({ "x": "a", "y": "b" }));
        let mut payload = FieldPayload::new();
        payload.clear("x").set("z", "c");

        r.apply(&payload);

        assert!(!r.is_present("x"));
        assert_eq!(r.text("y"), Some("b"));
        assert_eq!(r.text("z"), Some("c"));
    }
}
