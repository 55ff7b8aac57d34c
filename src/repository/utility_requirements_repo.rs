// ==========================================
// 光伏 BOS 配置引擎 - 电力公司 BOS 要求仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::equipment::UtilityRequirements;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

/// 电力公司 BOS 要求仓储
/// 职责: 管理 utility_bos_requirement 表
pub struct UtilityRequirementsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UtilityRequirementsRepository {
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

    /// 新增一条要求
    pub fn insert(&self, req: &UtilityRequirements) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let [b1, b2, b3, b4, b5, b6] = &req.bos_types;
        conn.execute(
            r#"
            INSERT INTO utility_bos_requirement (
                utility_name, state, combination, bos_1, bos_2, bos_3, bos_4, bos_5, bos_6
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![req.utility_name, req.state, req.combination, b1, b2, b3, b4, b5, b6],
        )?;
        Ok(())
    }

    /// 按电力公司名称（可选州）查询
    ///
    /// # 说明
    /// - 名称不区分大小写
    /// - 指定州时优先返回同州记录，其次返回未指定州的通用记录
    pub fn find(
        &self,
        utility_name: &str,
        state: Option<&str>,
    ) -> RepositoryResult<Option<UtilityRequirements>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT utility_name, state, combination, bos_1, bos_2, bos_3, bos_4, bos_5, bos_6
            FROM utility_bos_requirement
            WHERE utility_name = ?1 COLLATE NOCASE
              AND (?2 IS NULL OR state IS NULL OR state = ?2 COLLATE NOCASE)
            ORDER BY CASE WHEN state IS NULL THEN 1 ELSE 0 END
            LIMIT 1
            "#,
        )?;

        let result = stmt
            .query_row(params![utility_name, state], Self::map_row)
            .optional()?;
        Ok(result)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<UtilityRequirements> {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(UtilityRequirements {
            utility_name: row.get(0)?,
            state: clean(row.get(1)?),
            combination: clean(row.get(2)?),
            bos_types: [
                clean(row.get(3)?),
                clean(row.get(4)?),
                clean(row.get(5)?),
                clean(row.get(6)?),
                clean(row.get(7)?),
                clean(row.get(8)?),
            ],
        })
    }
}
