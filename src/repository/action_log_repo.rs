// ==========================================
// 学校排课系统 - 操作日志仓储
// ==========================================
// 红线: 所有课表写入必须留痕
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的 ActionLogRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_with_conn(&conn, log)
    }

    /// 在既有连接/事务上插入操作日志
    ///
    /// 说明: 变更集落库与日志写入必须共用同一事务
    pub fn insert_with_conn(conn: &Connection, log: &ActionLog) -> RepositoryResult<()> {
        let payload = log
            .payload_json
            .as_ref()
            .map(|v| v.to_string());

        conn.execute(
            r#"INSERT INTO action_log (
                    action_id, action_type, block_id, payload_json, detail, action_ts, actor
                ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &log.action_id,
                &log.action_type,
                &log.block_id,
                &payload,
                &log.detail,
                &log.action_ts,
                &log.actor,
            ],
        )?;
        Ok(())
    }

    /// 查询最近的操作日志 (时间倒序)
    pub fn find_recent(&self, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, action_type, block_id, payload_json, detail, action_ts, actor
               FROM action_log
               ORDER BY action_ts DESC, action_id DESC
               LIMIT ?"#,
        )?;

        let logs = stmt
            .query_map(params![limit], |row| {
                let payload: Option<String> = row.get(3)?;
                Ok(ActionLog {
                    action_id: row.get(0)?,
                    action_type: row.get(1)?,
                    block_id: row.get(2)?,
                    payload_json: payload.and_then(|p| serde_json::from_str(&p).ok()),
                    detail: row.get(4)?,
                    action_ts: row.get(5)?,
                    actor: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<ActionLog>, _>>()?;

        Ok(logs)
    }

    /// 日志总数
    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM action_log", [], |row| row.get(0))?;
        Ok(count)
    }
}
