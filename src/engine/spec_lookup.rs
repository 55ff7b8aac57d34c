// ==========================================
// 光伏 BOS 配置引擎 - 设备规格查询
// ==========================================
// 职责: 定义提取器所需的规格查询接口（电池耦合方式、逆变器最大输出）
// 说明: Engine 层定义 trait，Repository 层提供 SQLite 实现
// ==========================================

use crate::domain::types::CouplingType;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::collections::HashMap;

/// 设备规格查询接口
#[async_trait]
pub trait EquipmentSpecLookup: Send + Sync {
    /// 电池耦合方式（battery_spec.couple_type）
    async fn battery_coupling(&self, make: &str, model: &str)
        -> RepositoryResult<Option<CouplingType>>;

    /// 逆变器单台最大持续输出电流（A）
    async fn inverter_output_amps(&self, make: &str, model: &str) -> RepositoryResult<Option<f64>>;
}

fn spec_key(make: &str, model: &str) -> (String, String) {
    (make.trim().to_lowercase(), model.trim().to_lowercase())
}

/// 内存规格表
#[derive(Debug, Clone, Default)]
pub struct StaticSpecLookup {
    inverters: HashMap<(String, String), f64>,
    batteries: HashMap<(String, String), CouplingType>,
}

impl StaticSpecLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inverter(mut self, make: &str, model: &str, amps: f64) -> Self {
        self.inverters.insert(spec_key(make, model), amps);
        self
    }

    pub fn with_battery(mut self, make: &str, model: &str, coupling: CouplingType) -> Self {
        self.batteries.insert(spec_key(make, model), coupling);
        self
    }
}

#[async_trait]
impl EquipmentSpecLookup for StaticSpecLookup {
    async fn battery_coupling(
        &self,
        make: &str,
        model: &str,
    ) -> RepositoryResult<Option<CouplingType>> {
        Ok(self.batteries.get(&spec_key(make, model)).copied())
    }

    async fn inverter_output_amps(&self, make: &str, model: &str) -> RepositoryResult<Option<f64>> {
        Ok(self.inverters.get(&spec_key(make, model)).copied())
    }
}
