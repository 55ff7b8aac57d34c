// ==========================================
// 光伏 BOS 配置引擎 - 引擎编排器
// ==========================================
// 用途: 协调 提取 → 匹配 → 合并规则 → 自动填充 的执行顺序
// 职责: 执行工作流副作用，发布用户通知
// 红线: 状态转换只由 workflow::reduce 决定
// ==========================================

use crate::domain::bos::{ConfigurationMatch, MultiSystemAnalysis};
use crate::domain::equipment::{SystemEquipment, UtilityRequirements};
use crate::domain::field::ProjectRecord;
use crate::domain::types::SystemNumber;
use crate::engine::auto_population::{AutoPopulationOptions, AutoPopulationReport, AutoPopulationService};
use crate::engine::combination::{apply_combination_rules, CombineMode, CombineSettings};
use crate::engine::error::BosResult;
use crate::engine::extractor::EquipmentExtractor;
use crate::engine::notifications::OptionalNotificationSink;
use crate::engine::sizing::combined_required_amps;
use crate::engine::switchboard::ConfigurationSwitchboard;
use crate::engine::workflow::{reduce, ApplySummary, Effect, WorkflowEvent, WorkflowState};
use crate::repository::{ProjectStore, UtilityRequirementsRepository};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, instrument, warn};

/// 项目所在州字段（电力公司要求按州区分）
const FIELD_PROJECT_STATE: &str = "address_state";
const FIELD_UTILITY_NAME: &str = "utility_name";

// ==========================================
// DetectionOutcome - 检测结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    pub project_uuid: String,
    pub equipment: Vec<SystemEquipment>,
    pub analysis: MultiSystemAnalysis,
    /// 已应用合并规则的最佳匹配（每系统一个）
    pub matches: Vec<ConfigurationMatch>,
    pub combine_mode: Option<CombineMode>,
    pub combined_amps: Option<u32>,
}

impl DetectionOutcome {
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }
}

// ==========================================
// BosOrchestrator - 引擎编排器
// ==========================================
pub struct BosOrchestrator {
    store: Arc<dyn ProjectStore>,
    extractor: EquipmentExtractor,
    switchboard: ConfigurationSwitchboard,
    population: AutoPopulationService,
    utility_repo: Option<Arc<UtilityRequirementsRepository>>,
    notifier: OptionalNotificationSink,
    state: Mutex<WorkflowState>,
}

impl BosOrchestrator {
    /// 创建新的编排器实例
    ///
    /// # 参数
    /// - store: 项目字段存储
    /// - extractor: 设备状态提取器
    /// - population: 自动填充服务（与编排器共享同一存储）
    pub fn new(
        store: Arc<dyn ProjectStore>,
        extractor: EquipmentExtractor,
        population: AutoPopulationService,
    ) -> Self {
        Self {
            store,
            extractor,
            switchboard: ConfigurationSwitchboard::default(),
            population,
            utility_repo: None,
            notifier: OptionalNotificationSink::none(),
            state: Mutex::new(WorkflowState::Idle),
        }
    }

    pub fn with_switchboard(mut self, switchboard: ConfigurationSwitchboard) -> Self {
        self.switchboard = switchboard;
        self
    }

    pub fn with_utility_repo(mut self, repo: Arc<UtilityRequirementsRepository>) -> Self {
        self.utility_repo = Some(repo);
        self
    }

    pub fn with_notifier(mut self, notifier: OptionalNotificationSink) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn switchboard(&self) -> &ConfigurationSwitchboard {
        &self.switchboard
    }

    pub fn population(&self) -> &AutoPopulationService {
        &self.population
    }

    /// 当前工作流状态
    pub fn state(&self) -> WorkflowState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(WorkflowState::Idle)
    }

    /// 执行检测流程（不写入）
    ///
    /// # 返回
    /// - Ok: 每个系统的分析与合并后的匹配
    /// - Err(Repository): 读取项目字段失败
    #[instrument(skip(self))]
    pub async fn detect(&self, project_uuid: &str) -> BosResult<DetectionOutcome> {
        let record = self.store.fetch_project_fields(project_uuid).await?;
        let utility = self.lookup_utility(&record);

        // ==========================================
        // 步骤1: 设备状态提取
        // ==========================================
        let equipment = self.extractor.extract_all(&record, utility.as_ref()).await;
        debug!(systems = equipment.len(), "步骤1: 设备状态提取完成");

        // ==========================================
        // 步骤2: 配置匹配
        // ==========================================
        let analysis = self.switchboard.analyze_all_systems(&equipment);
        for w in &analysis.warnings {
            warn!(warning = %w, "配置匹配警告");
        }

        // ==========================================
        // 步骤3: 合并规则
        // ==========================================
        let settings = CombineSettings::from_record(&record);
        let outcome = apply_combination_rules(analysis.best_matches(), &equipment, &settings);

        info!(
            systems = equipment.len(),
            matched = analysis.systems_with_matches,
            combine_mode = ?outcome.mode,
            "BOS 配置检测完成"
        );

        Ok(DetectionOutcome {
            project_uuid: project_uuid.to_string(),
            equipment,
            analysis,
            matches: outcome.matches,
            combine_mode: outcome.mode,
            combined_amps: outcome.combined_amps,
        })
    }

    /// 写入匹配结果
    pub async fn apply(
        &self,
        project_uuid: &str,
        matches: &[ConfigurationMatch],
        options: &AutoPopulationOptions,
    ) -> BosResult<AutoPopulationReport> {
        self.population.auto_populate(project_uuid, matches, options).await
    }

    /// 分发工作流事件并执行全部副作用
    ///
    /// # 参数
    /// - project_uuid: 项目 UUID
    /// - event: 外部事件（检测请求、用户确认/拒绝、重置）
    /// - options: 填充选项
    ///
    /// # 返回
    /// 副作用执行完毕后的状态
    ///
    /// # 说明
    /// 副作用产生的后续事件（检测完成、填充完成）在本次调用内继续分发
    #[instrument(skip(self, event, options))]
    pub async fn dispatch(
        &self,
        project_uuid: &str,
        event: WorkflowEvent,
        options: &AutoPopulationOptions,
    ) -> WorkflowState {
        let mut pending = vec![event];

        while let Some(event) = pending.pop() {
            let effects = self.transition(event);
            for effect in effects {
                match effect {
                    Effect::Notify(notification) => self.notifier.notify(notification),
                    Effect::RunDetection => {
                        let next = match self.detect(project_uuid).await {
                            Ok(outcome) => WorkflowEvent::DetectionFinished {
                                matches: outcome.matches,
                            },
                            Err(e) => {
                                error!(error = %e, "BOS 配置检测失败");
                                WorkflowEvent::DetectionFailed { reason: e.to_string() }
                            }
                        };
                        pending.push(next);
                    }
                    Effect::ApplyMatches { matches } => {
                        let next = match self.apply(project_uuid, &matches, options).await {
                            Ok(report) => {
                                debug!(failed = ?report.failed_systems(), "填充报告已生成");
                                WorkflowEvent::ApplyFinished {
                                    summary: ApplySummary::from(&report),
                                }
                            }
                            Err(e) => {
                                error!(error = %e, "BOS 自动填充失败");
                                WorkflowEvent::ApplyFailed { reason: e.to_string() }
                            }
                        };
                        pending.push(next);
                    }
                }
            }
        }

        self.state()
    }

    /// 检测并在有匹配时直接写入（无人工确认，CLI / 批处理使用）
    pub async fn detect_and_apply(
        &self,
        project_uuid: &str,
        options: &AutoPopulationOptions,
    ) -> WorkflowState {
        self.dispatch(project_uuid, WorkflowEvent::Reset, options).await;
        let state = self
            .dispatch(project_uuid, WorkflowEvent::DetectRequested, options)
            .await;
        if matches!(state, WorkflowState::AwaitingConfirmation { .. }) {
            return self
                .dispatch(project_uuid, WorkflowEvent::ApplyConfirmed, options)
                .await;
        }
        state
    }

    fn transition(&self, event: WorkflowEvent) -> Vec<Effect> {
        let Ok(mut guard) = self.state.lock() else {
            warn!("工作流状态锁已中毒，忽略事件");
            return Vec::new();
        };
        let current = std::mem::replace(&mut *guard, WorkflowState::Idle);
        let (next, effects) = reduce(current, event);
        *guard = next;
        effects
    }

    fn lookup_utility(&self, record: &ProjectRecord) -> Option<UtilityRequirements> {
        let repo = self.utility_repo.as_ref()?;
        let name = record.text(FIELD_UTILITY_NAME)?;
        match repo.find(name, record.text(FIELD_PROJECT_STATE)) {
            Ok(found) => found,
            Err(e) => {
                warn!(utility = name, error = %e, "电力公司要求查询失败，按无要求处理");
                None
            }
        }
    }
}

/// 全部系统合并后的最大持续输出
///
/// ceil(Σ (逆变器 + 电池1 + 电池2) × 1.25)，合计为 0 时返回 None
pub fn combined_max_output(record: &ProjectRecord) -> Option<u32> {
    let totals: Vec<f64> = SystemNumber::ALL
        .iter()
        .map(|sys| {
            let n = sys.get();
            let inverter = record
                .number(&format!("sys{}_inv_max_continuous_output", n))
                .unwrap_or(0.0);
            let battery_1 = record
                .number(&format!("sys{}_battery_1_max_continuous_output", n))
                .unwrap_or(0.0);
            let battery_2 = record
                .number(&format!("sys{}_battery_2_max_continuous_output", n))
                .unwrap_or(0.0);
            inverter + battery_1 + battery_2
        })
        .collect();

    match combined_required_amps(&totals) {
        0 => None,
        amps => Some(amps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CouplingType;
    use crate::engine::bos_catalog::BosCatalog;
    use crate::engine::notifications::{CollectingNotificationSink, NotificationLevel};
    use crate::engine::spec_lookup::StaticSpecLookup;
    use crate::repository::InMemoryProjectStore;
    use serde_json::json;

    fn pv_only_record() -> ProjectRecord {
        ProjectRecord::from_value(json!({
            "utility_name": "APS",
            "sys1_solar_panel_make": "REC",
            "sys1_solar_panel_model": "Alpha 405",
            "sys1_solar_panel_qty": 20,
            "sys1_selectedsystem": "inverter",
            "sys1_micro_inverter_make": "SolarEdge",
            "sys1_micro_inverter_model": "SE7600H-US",
            "sys1_micro_inverter_qty": 1,
        }))
    }

    fn orchestrator(
        store: Arc<InMemoryProjectStore>,
        sink: Arc<CollectingNotificationSink>,
    ) -> BosOrchestrator {
        let lookup = StaticSpecLookup::new()
            .with_inverter("SolarEdge", "SE7600H-US", 32.0)
            .with_battery("Tesla", "Powerwall 3", CouplingType::Ac);
        let catalog = BosCatalog::bundled().unwrap();
        let population = AutoPopulationService::new(store.clone(), Arc::new(catalog));
        BosOrchestrator::new(store, EquipmentExtractor::new(Arc::new(lookup)), population)
            .with_notifier(OptionalNotificationSink::with_sink(sink))
    }

    #[test]
    fn test_combined_max_output() {
        let record = ProjectRecord::from_value(json!({
            "sys1_inv_max_continuous_output": 20,
            "sys2_inv_max_continuous_output": "30",
            "sys2_battery_1_max_continuous_output": 10,
        }));
        assert_eq!(combined_max_output(&record), Some(75));
        assert_eq!(combined_max_output(&ProjectRecord::default()), None);
    }

    #[test]
    fn test_combined_max_output_ignores_float_noise() {
        // 18.4 × 1.25 = 23，浮点误差不进位
        let record = ProjectRecord::from_value(json!({
            "sys1_inv_max_continuous_output": 0.1,
            "sys2_inv_max_continuous_output": 18.3,
        }));
        assert_eq!(combined_max_output(&record), Some(23));
    }

    #[tokio::test]
    async fn test_detect_pv_only() {
        let store = Arc::new(InMemoryProjectStore::with_project("p1", pv_only_record()));
        let sink = Arc::new(CollectingNotificationSink::new());
        let orch = orchestrator(store, sink);

        let outcome = orch.detect("p1").await.unwrap();
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].config_id, "APS_PV_ONLY_STRING_INVERTER");
        assert_eq!(outcome.combine_mode, None);
    }

    #[tokio::test]
    async fn test_dispatch_runs_to_confirmation_then_applies() {
        let store = Arc::new(InMemoryProjectStore::with_project("p1", pv_only_record()));
        let sink = Arc::new(CollectingNotificationSink::new());
        let orch = orchestrator(store.clone(), sink.clone());
        let options = AutoPopulationOptions::default();

        let state = orch
            .dispatch("p1", WorkflowEvent::DetectRequested, &options)
            .await;
        assert!(matches!(state, WorkflowState::AwaitingConfirmation { .. }));
        assert_eq!(sink.take().len(), 1);

        let state = orch
            .dispatch("p1", WorkflowEvent::ApplyConfirmed, &options)
            .await;
        let WorkflowState::Completed { summary } = state else {
            panic!("unexpected state: {:?}", state);
        };
        assert_eq!(summary.added, 2);
        assert!(summary.failed_systems.is_empty());
        assert_eq!(sink.notifications()[0].level, NotificationLevel::Success);
        assert_eq!(store.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_detect_and_apply_without_match() {
        let store = Arc::new(InMemoryProjectStore::with_project("empty", ProjectRecord::default()));
        let sink = Arc::new(CollectingNotificationSink::new());
        let orch = orchestrator(store.clone(), sink);

        let state = orch
            .detect_and_apply("empty", &AutoPopulationOptions::default())
            .await;
        assert_eq!(state, WorkflowState::NoMatch);
        assert_eq!(store.save_calls(), 0);
    }
}
