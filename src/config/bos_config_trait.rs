// ==========================================
// 光伏 BOS 配置引擎 - 填充配置读取 Trait
// ==========================================
// 职责: 定义自动填充所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::engine::auto_population::AutoPopulationOptions;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// BosConfigReader Trait
// ==========================================
// 用途: 自动填充与检测所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait BosConfigReader: Send + Sync {
    /// 目录可唯一确定时是否自动选择品牌/型号
    ///
    /// # 默认值
    /// - true
    async fn get_auto_select_when_possible(&self) -> Result<bool, Box<dyn Error>>;

    /// 是否跳过已填写的槽位与字段
    ///
    /// # 默认值
    /// - true
    async fn get_skip_existing(&self) -> Result<bool, Box<dyn Error>>;

    /// 写入后回读前的等待时间（毫秒）
    ///
    /// # 默认值
    /// - 0
    async fn get_refresh_delay_ms(&self) -> Result<u64, Box<dyn Error>>;

    /// 每个系统返回的候选匹配数
    ///
    /// # 默认值
    /// - 2
    async fn get_top_match_count(&self) -> Result<usize, Box<dyn Error>>;

    /// 项目未填写电力公司时使用的默认值
    ///
    /// # 默认值
    /// - "APS"
    async fn get_default_utility(&self) -> Result<String, Box<dyn Error>>;

    /// 组装填充选项
    async fn load_population_options(
        &self,
        company_uuid: Option<String>,
    ) -> Result<AutoPopulationOptions, Box<dyn Error>> {
        // Box<dyn Error> 非 Send，每个结果单独绑定，不跨 await 存活
        let auto_select_when_possible = self.get_auto_select_when_possible().await?;
        let skip_existing = self.get_skip_existing().await?;
        let refresh_delay_ms = self.get_refresh_delay_ms().await?;
        Ok(AutoPopulationOptions {
            auto_select_when_possible,
            skip_existing,
            company_uuid,
            refresh_delay_ms,
        })
    }
}
