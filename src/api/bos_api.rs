// ==========================================
// 光伏 BOS 配置引擎 - BOS 业务 API
// ==========================================
// 职责: 检测、自动填充、Post Combine BOS 与系统汇流箱维护、系统合并
// 红线: 所有写入走 ProjectStore 部分写入，不整表覆盖
// ==========================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::BosConfigReader;
use crate::domain::bos::ConfigurationMatch;
use crate::domain::combiner::{PostCombineBosEntry, SystemCombinerPanel};
use crate::domain::types::{PostCombineType, SystemNumber};
use crate::engine::auto_population::{AutoPopulationOptions, AutoPopulationReport};
use crate::engine::combination::{
    clear_combine_payload, combine_systems_payload, generate_combine_options,
    validate_combine_eligibility, CombineEligibility, CombineOption,
};
use crate::engine::orchestrator::{combined_max_output, BosOrchestrator, DetectionOutcome};
use crate::engine::slot_allocator::{
    clear_slot_payload, has_system_combiner_panel, load_post_combine_bos, post_combine_payload,
    system_combiner_panel_payload, SlotAllocation,
};
use crate::repository::ProjectStore;

// ==========================================
// PostCombineSlotView - 槽位视图
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCombineSlotView {
    pub allocation: SlotAllocation,
    pub has_combiner_panel: bool,
    pub combiner_panel: Option<SystemCombinerPanel>,
    pub entries: Vec<(PostCombineType, PostCombineBosEntry)>,
}

// ==========================================
// BosApi - BOS 业务 API
// ==========================================

/// BOS 业务 API
///
/// 职责：
/// 1. 配置检测（只读）与自动填充
/// 2. Post Combine BOS 单槽位保存/清除
/// 3. 系统汇流箱保存
/// 4. 系统合并/取消合并与落点选项
pub struct BosApi {
    store: Arc<dyn ProjectStore>,
    orchestrator: Arc<BosOrchestrator>,
    config: Arc<dyn BosConfigReader>,
}

impl BosApi {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        orchestrator: Arc<BosOrchestrator>,
        config: Arc<dyn BosConfigReader>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            config,
        }
    }

    pub fn orchestrator(&self) -> &BosOrchestrator {
        &self.orchestrator
    }

    fn require_uuid(project_uuid: &str) -> ApiResult<()> {
        if project_uuid.trim().is_empty() {
            return Err(ApiError::InvalidInput("项目UUID不能为空".to_string()));
        }
        Ok(())
    }

    async fn population_options(&self, company_uuid: Option<String>) -> ApiResult<AutoPopulationOptions> {
        self.config
            .load_population_options(company_uuid)
            .await
            .map_err(|e| ApiError::InternalError(format!("读取填充配置失败: {}", e)))
    }

    // ==========================================
    // 检测与自动填充
    // ==========================================

    /// 检测项目 BOS 配置
    ///
    /// # 返回
    /// - Ok(DetectionOutcome): 每个系统的候选匹配（按配置截断）与合并后的最佳匹配
    #[instrument(skip(self))]
    pub async fn detect(&self, project_uuid: &str) -> ApiResult<DetectionOutcome> {
        Self::require_uuid(project_uuid)?;

        let top_n = self
            .config
            .get_top_match_count()
            .await
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let mut outcome = self.orchestrator.detect(project_uuid).await?;
        for analysis in &mut outcome.analysis.systems {
            analysis.matches.truncate(top_n);
        }
        Ok(outcome)
    }

    /// 检测并写入
    ///
    /// # 参数
    /// - project_uuid: 项目UUID
    /// - company_uuid: 公司UUID（读取偏好设备，可选）
    ///
    /// # 返回
    /// - Ok(AutoPopulationReport): 各系统写入报告（单系统失败记录在报告中）
    /// - Err(NotFound): 无任何匹配
    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        project_uuid: &str,
        company_uuid: Option<String>,
    ) -> ApiResult<AutoPopulationReport> {
        Self::require_uuid(project_uuid)?;

        let outcome = self.orchestrator.detect(project_uuid).await?;
        if !outcome.has_matches() {
            return Err(ApiError::NotFound(format!("项目{}无匹配的 BOS 配置", project_uuid)));
        }
        self.apply_matches(project_uuid, &outcome.matches, company_uuid).await
    }

    /// 写入指定匹配（用户确认后的结果）
    pub async fn apply_matches(
        &self,
        project_uuid: &str,
        matches: &[ConfigurationMatch],
        company_uuid: Option<String>,
    ) -> ApiResult<AutoPopulationReport> {
        Self::require_uuid(project_uuid)?;
        let options = self.population_options(company_uuid).await?;
        let report = self.orchestrator.apply(project_uuid, matches, &options).await?;
        if !report.is_success() {
            warn!(failed = ?report.failed_systems(), "部分系统写入失败");
        }
        Ok(report)
    }

    // ==========================================
    // Post Combine BOS / 系统汇流箱
    // ==========================================

    /// 保存单个 Post Combine BOS
    ///
    /// # 返回
    /// - Err(SlotUnavailable): 已配置系统汇流箱时保存 Type 3
    pub async fn save_post_combine_bos(
        &self,
        project_uuid: &str,
        kind: PostCombineType,
        entry: &PostCombineBosEntry,
    ) -> ApiResult<()> {
        Self::require_uuid(project_uuid)?;
        if entry.equipment_type.trim().is_empty() {
            return Err(ApiError::InvalidInput("设备类型不能为空".to_string()));
        }

        let record = self.store.fetch_project_fields(project_uuid).await?;
        let payload = post_combine_payload(kind, entry, has_system_combiner_panel(&record))?;
        self.store.save_project_fields(project_uuid, &payload).await?;
        info!(project_uuid, kind = %kind, equipment_type = %entry.equipment_type, "Post Combine BOS 已保存");
        Ok(())
    }

    /// 清除单个 Post Combine BOS
    pub async fn clear_post_combine_bos(&self, project_uuid: &str, kind: PostCombineType) -> ApiResult<()> {
        Self::require_uuid(project_uuid)?;
        let record = self.store.fetch_project_fields(project_uuid).await?;
        let slot = SlotAllocation::from_record(&record).slot_for(kind)?;
        self.store
            .save_project_fields(project_uuid, &clear_slot_payload(slot))
            .await?;
        Ok(())
    }

    /// 保存系统汇流箱（镜像到槽位 1）
    pub async fn save_system_combiner_panel(
        &self,
        project_uuid: &str,
        panel: &SystemCombinerPanel,
    ) -> ApiResult<()> {
        Self::require_uuid(project_uuid)?;
        if !panel.is_present() {
            return Err(ApiError::InvalidInput("汇流箱品牌或型号不能为空".to_string()));
        }
        self.store
            .save_project_fields(project_uuid, &system_combiner_panel_payload(panel))
            .await?;
        info!(project_uuid, make = ?panel.make, model = ?panel.model, "系统汇流箱已保存");
        Ok(())
    }

    /// 读取槽位状态与已保存的 Post Combine BOS
    pub async fn load_post_combine_slots(&self, project_uuid: &str) -> ApiResult<PostCombineSlotView> {
        Self::require_uuid(project_uuid)?;
        let record = self.store.fetch_project_fields(project_uuid).await?;
        Ok(PostCombineSlotView {
            allocation: SlotAllocation::from_record(&record),
            has_combiner_panel: has_system_combiner_panel(&record),
            combiner_panel: SystemCombinerPanel::from_record(&record),
            entries: load_post_combine_bos(&record),
        })
    }

    // ==========================================
    // 系统合并
    // ==========================================

    pub async fn combine_eligibility(&self, project_uuid: &str) -> ApiResult<CombineEligibility> {
        Self::require_uuid(project_uuid)?;
        let record = self.store.fetch_project_fields(project_uuid).await?;
        Ok(validate_combine_eligibility(&record))
    }

    /// 合并落点选项
    pub async fn combine_options(&self, project_uuid: &str) -> ApiResult<Vec<CombineOption>> {
        let eligibility = self.combine_eligibility(project_uuid).await?;
        let record = self.store.fetch_project_fields(project_uuid).await?;
        Ok(generate_combine_options(&record, &eligibility.active_systems))
    }

    /// 合并系统
    ///
    /// # 参数
    /// - landings: 系统 → 落点（可部分填写）
    ///
    /// # 返回
    /// - Err(BusinessRuleViolation): 不满足合并条件（原因逐条列出）
    #[instrument(skip(self, landings))]
    pub async fn combine_systems(
        &self,
        project_uuid: &str,
        landings: &BTreeMap<SystemNumber, String>,
    ) -> ApiResult<CombineEligibility> {
        let eligibility = self.combine_eligibility(project_uuid).await?;
        if !eligibility.valid {
            return Err(ApiError::BusinessRuleViolation(eligibility.errors.join("; ")));
        }

        let payload = combine_systems_payload(&eligibility.active_systems, landings);
        self.store.save_project_fields(project_uuid, &payload).await?;
        info!(
            project_uuid,
            systems = ?eligibility.active_systems,
            "系统已合并"
        );
        Ok(eligibility)
    }

    /// 取消合并
    pub async fn uncombine_systems(&self, project_uuid: &str) -> ApiResult<()> {
        Self::require_uuid(project_uuid)?;
        self.store
            .save_project_fields(project_uuid, &clear_combine_payload())
            .await?;
        info!(project_uuid, "系统合并已取消");
        Ok(())
    }

    /// 全部系统合并后的最大持续输出（A）
    pub async fn combined_max_output(&self, project_uuid: &str) -> ApiResult<Option<u32>> {
        Self::require_uuid(project_uuid)?;
        let record = self.store.fetch_project_fields(project_uuid).await?;
        Ok(combined_max_output(&record))
    }
}
