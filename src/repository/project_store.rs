// ==========================================
// 光伏 BOS 配置引擎 - 项目字段存储
// ==========================================
// 职责: 项目扁平字段的读取与部分写入
// 红线: Repository 不含业务逻辑，只负责数据访问
// 约定: 写入值为 null 时清除该字段
// ==========================================

use crate::domain::field::{FieldPayload, ProjectRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ==========================================
// ProjectStore Trait
// ==========================================
// 实现者: SqliteProjectStore（project_field 表）、InMemoryProjectStore（测试/离线）
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// 读取项目全部字段
    ///
    /// # 返回
    /// - 项目不存在时返回空记录
    async fn fetch_project_fields(&self, project_uuid: &str) -> RepositoryResult<ProjectRecord>;

    /// 部分写入项目字段（upsert，null 表示清除）
    async fn save_project_fields(
        &self,
        project_uuid: &str,
        payload: &FieldPayload,
    ) -> RepositoryResult<()>;
}

// ==========================================
// SqliteProjectStore - SQLite 实现
// ==========================================
pub struct SqliteProjectStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProjectStore {
    /// 创建新的 SqliteProjectStore 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn fetch_project_fields(&self, project_uuid: &str) -> RepositoryResult<ProjectRecord> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT field_key, field_value FROM project_field WHERE project_uuid = ?1 ORDER BY field_key",
        )?;

        let rows = stmt.query_map(params![project_uuid], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fields = Map::new();
        for row in rows {
            let (key, raw) = row?;
            // 非 JSON 文本按字符串保留
            let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
            fields.insert(key, value);
        }

        tracing::debug!(project_uuid, field_count = fields.len(), "读取项目字段");
        Ok(ProjectRecord::new(fields))
    }

    async fn save_project_fields(
        &self,
        project_uuid: &str,
        payload: &FieldPayload,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for (key, value) in payload.iter() {
            if value.is_null() {
                tx.execute(
                    "DELETE FROM project_field WHERE project_uuid = ?1 AND field_key = ?2",
                    params![project_uuid, key],
                )?;
            } else {
                tx.execute(
                    r#"
                    INSERT INTO project_field (project_uuid, field_key, field_value, updated_at)
                    VALUES (?1, ?2, ?3, datetime('now'))
                    ON CONFLICT(project_uuid, field_key)
                    DO UPDATE SET field_value = excluded.field_value, updated_at = excluded.updated_at
                    "#,
                    params![project_uuid, key, serde_json::to_string(value)?],
                )?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tracing::debug!(project_uuid, field_count = payload.len(), "写入项目字段");
        Ok(())
    }
}

// ==========================================
// InMemoryProjectStore - 内存实现
// ==========================================
/// 内存项目存储
///
/// 支持按字段前缀注入写入失败，用于验证"单系统失败不影响其他系统"
#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: Mutex<HashMap<String, ProjectRecord>>,
    failing_prefixes: Mutex<Vec<String>>,
    save_calls: AtomicUsize,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以初始字段创建
    pub fn with_project(project_uuid: &str, record: ProjectRecord) -> Self {
        let store = Self::new();
        if let Ok(mut projects) = store.projects.lock() {
            projects.insert(project_uuid.to_string(), record);
        }
        store
    }

    /// 任何包含该前缀字段的写入都将失败
    pub fn fail_writes_with_prefix(&self, prefix: impl Into<String>) {
        if let Ok(mut prefixes) = self.failing_prefixes.lock() {
            prefixes.push(prefix.into());
        }
    }

    /// 已执行的写入次数（含失败）
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn fetch_project_fields(&self, project_uuid: &str) -> RepositoryResult<ProjectRecord> {
        let projects = self
            .projects
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(projects.get(project_uuid).cloned().unwrap_or_default())
    }

    async fn save_project_fields(
        &self,
        project_uuid: &str,
        payload: &FieldPayload,
    ) -> RepositoryResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        {
            let prefixes = self
                .failing_prefixes
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            if let Some(prefix) = prefixes
                .iter()
                .find(|p| payload.iter().any(|(k, _)| k.starts_with(p.as_str())))
            {
                return Err(RepositoryError::StoreUnavailable(format!(
                    "写入被拒绝: prefix={}",
                    prefix
                )));
            }
        }

        let mut projects = self
            .projects
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        projects
            .entry(project_uuid.to_string())
            .or_default()
            .apply(payload);
        Ok(())
    }
}
