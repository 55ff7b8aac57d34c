// ==========================================
// 光伏 BOS 配置引擎 - 检测/填充工作流
// ==========================================
// 职责: 纯状态机 reduce(状态, 事件) → (新状态, 副作用列表)
// 红线: reducer 不做 I/O，副作用由 BosOrchestrator 执行
// 红线: 非法转换保持原状态且不产生副作用
// ==========================================

use crate::domain::bos::ConfigurationMatch;
use crate::domain::types::SystemNumber;
use crate::engine::auto_population::AutoPopulationReport;
use crate::engine::notifications::{Notification, NotificationLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 填充结果摘要（工作流只保留计数）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplySummary {
    pub added: usize,
    pub skipped: usize,
    pub requires_selection: usize,
    pub failed_systems: Vec<SystemNumber>,
}

impl From<&AutoPopulationReport> for ApplySummary {
    fn from(report: &AutoPopulationReport) -> Self {
        Self {
            added: report.added_count(),
            skipped: report.skipped_count(),
            requires_selection: report.requires_selection_count(),
            failed_systems: report.failed_systems(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Idle,
    Detecting,
    AwaitingConfirmation { matches: Vec<ConfigurationMatch> },
    Applying,
    Completed { summary: ApplySummary },
    NoMatch,
    Failed { reason: String },
}

impl WorkflowState {
    /// 可以开始新一轮检测
    fn accepts_detection(&self) -> bool {
        matches!(
            self,
            WorkflowState::Idle
                | WorkflowState::Completed { .. }
                | WorkflowState::NoMatch
                | WorkflowState::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowEvent {
    DetectRequested,
    DetectionFinished { matches: Vec<ConfigurationMatch> },
    DetectionFailed { reason: String },
    ApplyConfirmed,
    ApplyDeclined,
    ApplyFinished { summary: ApplySummary },
    ApplyFailed { reason: String },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    RunDetection,
    ApplyMatches { matches: Vec<ConfigurationMatch> },
    Notify(Notification),
}

/// 状态转换
pub fn reduce(state: WorkflowState, event: WorkflowEvent) -> (WorkflowState, Vec<Effect>) {
    use WorkflowEvent as E;
    use WorkflowState as S;

    match (state, event) {
        (_, E::Reset) => (S::Idle, vec![]),

        (s, E::DetectRequested) if s.accepts_detection() => (S::Detecting, vec![Effect::RunDetection]),

        (S::Detecting, E::DetectionFinished { matches }) if matches.is_empty() => (
            S::NoMatch,
            vec![notify(NotificationLevel::Info, "bos.detect.title", "bos.detect.no_match", &[])],
        ),
        (S::Detecting, E::DetectionFinished { matches }) => {
            let systems: BTreeSet<SystemNumber> = matches.iter().map(|m| m.system).collect();
            let count = systems.len().to_string();
            (
                S::AwaitingConfirmation { matches },
                vec![notify(
                    NotificationLevel::Info,
                    "bos.detect.title",
                    "bos.detect.found",
                    &[("systems", count.as_str())],
                )],
            )
        }
        (S::Detecting, E::DetectionFailed { reason }) => {
            let effect = notify(
                NotificationLevel::Error,
                "bos.detect.title",
                "bos.detect.failed",
                &[("reason", reason.as_str())],
            );
            (S::Failed { reason }, vec![effect])
        }

        (S::AwaitingConfirmation { matches }, E::ApplyConfirmed) => {
            (S::Applying, vec![Effect::ApplyMatches { matches }])
        }
        (S::AwaitingConfirmation { .. }, E::ApplyDeclined) => (
            S::Idle,
            vec![notify(NotificationLevel::Info, "bos.apply.title", "bos.apply.declined", &[])],
        ),

        (S::Applying, E::ApplyFinished { summary }) => {
            let effects = apply_notifications(&summary);
            (S::Completed { summary }, effects)
        }
        (S::Applying, E::ApplyFailed { reason }) => {
            let effect = notify(
                NotificationLevel::Error,
                "bos.apply.title",
                "bos.apply.failed",
                &[("reason", reason.as_str())],
            );
            (S::Failed { reason }, vec![effect])
        }

        (state, event) => {
            tracing::debug!(state = ?state, event = ?event, "忽略非法工作流转换");
            (state, vec![])
        }
    }
}

fn notify(level: NotificationLevel, title_key: &str, message_key: &str, args: &[(&str, &str)]) -> Effect {
    Effect::Notify(Notification::from_keys(level, title_key, message_key, args))
}

fn apply_notifications(summary: &ApplySummary) -> Vec<Effect> {
    let mut effects = Vec::new();
    if summary.failed_systems.is_empty() {
        effects.push(notify(
            NotificationLevel::Success,
            "bos.apply.title",
            "bos.apply.success",
            &[
                ("added", summary.added.to_string().as_str()),
                ("skipped", summary.skipped.to_string().as_str()),
            ],
        ));
    } else {
        let systems = summary
            .failed_systems
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        effects.push(notify(
            NotificationLevel::Error,
            "bos.apply.title",
            "bos.apply.partial",
            &[("systems", systems.as_str())],
        ));
    }
    if summary.requires_selection > 0 {
        effects.push(notify(
            NotificationLevel::Info,
            "bos.apply.title",
            "bos.apply.requires_selection",
            &[("count", summary.requires_selection.to_string().as_str())],
        ));
    }
    effects
}
