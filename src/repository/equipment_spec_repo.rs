// ==========================================
// 光伏 BOS 配置引擎 - 设备规格仓储
// ==========================================
// 职责: inverter_spec / battery_spec 表的读写
// 实现: engine::spec_lookup::EquipmentSpecLookup
// ==========================================

use crate::domain::types::CouplingType;
use crate::engine::spec_lookup::EquipmentSpecLookup;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct EquipmentSpecRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EquipmentSpecRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert_inverter(&self, make: &str, model: &str, max_output_amps: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO inverter_spec (make, model, max_cont_output_amps) VALUES (?1, ?2, ?3)",
            params![make, model, max_output_amps],
        )?;
        Ok(())
    }

    pub fn upsert_battery(&self, make: &str, model: &str, couple_type: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO battery_spec (make, model, couple_type) VALUES (?1, ?2, ?3)",
            params![make, model, couple_type],
        )?;
        Ok(())
    }
}

#[async_trait]
impl EquipmentSpecLookup for EquipmentSpecRepository {
    async fn battery_coupling(
        &self,
        make: &str,
        model: &str,
    ) -> RepositoryResult<Option<CouplingType>> {
        let conn = self.get_conn()?;
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT couple_type FROM battery_spec WHERE make = ?1 COLLATE NOCASE AND model = ?2 COLLATE NOCASE",
                params![make.trim(), model.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.flatten().as_deref().and_then(CouplingType::from_lookup))
    }

    async fn inverter_output_amps(&self, make: &str, model: &str) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let amps: Option<Option<f64>> = conn
            .query_row(
                "SELECT max_cont_output_amps FROM inverter_spec WHERE make = ?1 COLLATE NOCASE AND model = ?2 COLLATE NOCASE",
                params![make.trim(), model.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(amps.flatten())
    }
}
