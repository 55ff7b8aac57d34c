// ==========================================
// 光伏 BOS 配置引擎 - 配置匹配总调度
// ==========================================
// 职责: 按优先级运行检测器，汇总单系统与多系统匹配结果
// 规则: 系统 2 先分析；命中多系统配置时，受影响系统直接采用该配置
// ==========================================

use crate::domain::bos::{ConfigurationMatch, MultiSystemAnalysis, SystemAnalysis};
use crate::domain::equipment::SystemEquipment;
use crate::domain::types::SystemNumber;
use crate::engine::detectors::{default_detectors, ConfigurationDetector, DetectionContext};
use crate::i18n;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct ConfigurationSwitchboard {
    detectors: Vec<Arc<dyn ConfigurationDetector>>,
}

impl Default for ConfigurationSwitchboard {
    fn default() -> Self {
        Self::new(default_detectors())
    }
}

impl ConfigurationSwitchboard {
    /// 创建调度器（检测器按优先级稳定排序）
    pub fn new(mut detectors: Vec<Arc<dyn ConfigurationDetector>>) -> Self {
        detectors.sort_by_key(|d| d.priority());
        Self { detectors }
    }

    pub fn register(&mut self, detector: Arc<dyn ConfigurationDetector>) {
        self.detectors.push(detector);
        self.detectors.sort_by_key(|d| d.priority());
    }

    pub fn detectors(&self) -> &[Arc<dyn ConfigurationDetector>] {
        &self.detectors
    }

    /// 当前系统的全部匹配，按 (优先级, 置信度) 排序
    pub fn find_matching_configurations(&self, ctx: &DetectionContext<'_>) -> Vec<ConfigurationMatch> {
        let eq = ctx.equipment;
        let mut matches: Vec<ConfigurationMatch> = self
            .detectors
            .iter()
            .filter(|d| d.applies_to_utility(&eq.utility_name))
            .filter(|d| d.quick_check(eq))
            .filter_map(|d| {
                let m = d.detect(ctx);
                if m.is_some() {
                    debug!(system = %eq.system, config_id = d.config_id(), "检测器命中");
                }
                m
            })
            .collect();

        matches.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.confidence.cmp(&b.confidence)));
        matches
    }

    pub fn best_match(&self, ctx: &DetectionContext<'_>) -> Option<ConfigurationMatch> {
        self.find_matching_configurations(ctx).into_iter().next()
    }

    pub fn top_matches(&self, ctx: &DetectionContext<'_>, n: usize) -> Vec<ConfigurationMatch> {
        let mut matches = self.find_matching_configurations(ctx);
        matches.truncate(n);
        matches
    }

    /// 分析项目内全部系统
    ///
    /// # 参数
    /// - systems: 提取器输出（仅含有数据的系统）
    ///
    /// # 说明
    /// - 系统 2 先分析；其多系统匹配覆盖 landings 中列出的系统
    /// - 其余系统各自独立分析
    #[instrument(skip(self, systems), fields(systems = systems.len()))]
    pub fn analyze_all_systems(&self, systems: &[SystemEquipment]) -> MultiSystemAnalysis {
        let mut analyses: Vec<SystemAnalysis> = Vec::new();
        let mut covered: BTreeSet<SystemNumber> = BTreeSet::new();

        if let Some(sys2) = systems.iter().find(|s| s.system == SystemNumber::TWO) {
            let ctx = DetectionContext::new(sys2, systems);
            let matches = self.find_matching_configurations(&ctx);
            if let Some(multi) = matches.iter().find(|m| m.is_multi_system()).cloned() {
                info!(config_id = %multi.config_id, "命中多系统配置");
                for affected in Self::affected_systems(&multi) {
                    if !systems.iter().any(|s| s.system == affected) {
                        continue;
                    }
                    let mut shared = multi.clone();
                    shared.system = affected;
                    shared
                        .notes
                        .push(format!("多系统配置 {} 覆盖系统 {}", multi.config_id, affected));
                    analyses.push(SystemAnalysis {
                        system: affected,
                        matches: vec![shared.clone()],
                        best_match: Some(shared),
                    });
                    covered.insert(affected);
                }
            }
        }

        for eq in systems.iter().filter(|s| !covered.contains(&s.system)) {
            let ctx = DetectionContext::new(eq, systems);
            let matches = self.find_matching_configurations(&ctx);
            let best_match = matches.first().cloned();
            analyses.push(SystemAnalysis {
                system: eq.system,
                matches,
                best_match,
            });
        }
        analyses.sort_by_key(|a| a.system);

        let systems_with_matches = analyses.iter().filter(|a| a.best_match.is_some()).count();
        let warnings: Vec<String> = analyses
            .iter()
            .filter(|a| a.best_match.is_none())
            .map(|a| {
                i18n::t_with_args(
                    "bos.detect.no_match_for_system",
                    &[("system", a.system.to_string().as_str())],
                )
            })
            .collect();

        let mut recommendations = Vec::new();
        if systems_with_matches > 0 {
            recommendations.push(i18n::t_with_args(
                "bos.detect.summary",
                &[
                    ("matched", systems_with_matches.to_string().as_str()),
                    ("total", analyses.len().to_string().as_str()),
                ],
            ));
        }
        let distinct_multi: BTreeSet<&str> = analyses
            .iter()
            .filter_map(|a| a.best_match.as_ref())
            .filter(|m| m.is_multi_system())
            .map(|m| m.config_id.as_str())
            .collect();
        for config_id in distinct_multi {
            recommendations.push(format!("{}: 多系统配置，按共享清单写入", config_id));
        }

        info!(
            total = analyses.len(),
            matched = systems_with_matches,
            "多系统配置分析完成"
        );

        MultiSystemAnalysis {
            total_systems: analyses.len(),
            systems_with_matches,
            systems: analyses,
            recommendations,
            warnings,
        }
    }

    fn affected_systems(m: &ConfigurationMatch) -> Vec<SystemNumber> {
        m.multi_system
            .as_ref()
            .map(|cfg| cfg.landings.iter().map(|l| l.system).collect())
            .unwrap_or_else(|| vec![m.system])
    }
}
