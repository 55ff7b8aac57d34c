// ==========================================
// 光伏 BOS 配置引擎 - 公司偏好设备仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::catalog::PreferredEquipment;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 公司偏好设备仓储
/// 职责: 管理 preferred_equipment 表
pub struct PreferredEquipmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PreferredEquipmentRepository {
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

    pub fn insert(&self, company_uuid: &str, item: &PreferredEquipment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO preferred_equipment (company_uuid, equipment_type, make, model, amp_rating, is_default)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                company_uuid,
                item.equipment_type,
                item.make,
                item.model,
                item.amp_rating,
                item.is_default as i32,
            ],
        )?;
        Ok(())
    }

    /// 查询公司的全部偏好设备
    ///
    /// # 返回
    /// 默认项在前
    pub fn list_by_company(&self, company_uuid: &str) -> RepositoryResult<Vec<PreferredEquipment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT equipment_type, make, model, amp_rating, is_default
            FROM preferred_equipment
            WHERE company_uuid = ?1
            ORDER BY is_default DESC, equipment_type, make, model
            "#,
        )?;

        let rows = stmt.query_map(params![company_uuid], |row| {
            Ok(PreferredEquipment {
                equipment_type: row.get(0)?,
                make: row.get(1)?,
                model: row.get(2)?,
                amp_rating: row.get(3)?,
                is_default: row.get::<_, i32>(4)? != 0,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_by_company_orders_defaults_first() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let repo = PreferredEquipmentRepository::from_connection(Arc::new(Mutex::new(conn)));

        repo.insert(
            "C1",
            &PreferredEquipment {
                equipment_type: "AC Disconnect".to_string(),
                make: "EATON".to_string(),
                model: "DG222URB".to_string(),
                amp_rating: Some("60".to_string()),
                is_default: false,
            },
        )
        .unwrap();
        repo.insert(
            "C1",
            &PreferredEquipment {
                equipment_type: "PV Meter".to_string(),
                make: "MILBANK".to_string(),
                model: "U5929XL".to_string(),
                amp_rating: None,
                is_default: true,
            },
        )
        .unwrap();

        let items = repo.list_by_company("C1").unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_default);
        assert!(repo.list_by_company("C2").unwrap().is_empty());
    }
}
