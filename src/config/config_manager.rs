// ==========================================
// 学校排课系统 - 配置管理器
// ==========================================
// 职责: 配置加载, 查询, 覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::config::config_keys;
use crate::db::open_sqlite_connection;
use crate::engine::cascade::CascadeLimits;
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明: 为保证连接行为一致, 会对传入连接再次应用统一 PRAGMA (幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)
                .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值 (scope_id='global')
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取 global scope 的配置值 (公开方法, 供其他模块复用)
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
               ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value"#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取级联搜索边界 (缺失或非法值回落到默认)
    pub fn get_cascade_limits(&self) -> RepositoryResult<CascadeLimits> {
        let defaults = CascadeLimits::default();

        let parse_u32 = |raw: Option<String>, default: u32| -> u32 {
            raw.as_deref()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };
        let parse_usize = |raw: Option<String>, default: usize| -> usize {
            raw.as_deref()
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        Ok(CascadeLimits {
            max_chain_depth: parse_u32(
                self.get_config_value(config_keys::CASCADE_MAX_CHAIN_DEPTH)?,
                defaults.max_chain_depth,
            ),
            max_touched_blocks: parse_usize(
                self.get_config_value(config_keys::CASCADE_MAX_TOUCHED_BLOCKS)?,
                defaults.max_touched_blocks,
            ),
        })
    }
}
