// ==========================================
// 学校排课系统 - 教学块仓储
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 4.3 变更集落库 / 6. 持久化边界
// 红线: Repository 不含业务逻辑
// 红线: 变更集必须在单一事务内应用, 任一失败整体回滚
// ==========================================

use chrono::Utc;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::block::DistributionBlock;
use crate::domain::types::{EntityKind, PlacementSource};
use crate::engine::cascade::BlockMove;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// BlockRepository - 教学块仓储
// ==========================================
pub struct BlockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BlockRepository {
    /// 创建新的 BlockRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入教学块 (含教师关联, 事务内完成)
    pub fn insert(&self, block: &DistributionBlock) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO distribution_block (
                    block_id, class_id, lesson_code, room_id, day, hour,
                    duration, is_locked, is_placed, placement_source,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &block.block_id,
                &block.class_id,
                &block.lesson_code,
                &block.room_id,
                &block.day,
                &block.hour,
                &block.duration,
                if block.is_locked { 1 } else { 0 },
                if block.is_placed { 1 } else { 0 },
                block.placement_source.as_str(),
                &block.created_at,
                &block.updated_at,
            ],
        )?;

        {
            let mut stmt =
                tx.prepare("INSERT INTO block_teacher (block_id, teacher_id) VALUES (?, ?)")?;
            for teacher_id in &block.teacher_ids {
                stmt.execute(params![&block.block_id, teacher_id])?;
            }
        }

        if let Some((day, hour)) = block.window() {
            Self::insert_occupancy_rows(&tx, block, day, hour)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 查询全部教学块 (按ID字典序, 教师集合按ID字典序)
    pub fn find_all(&self) -> RepositoryResult<Vec<DistributionBlock>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT block_id, class_id, lesson_code, room_id, day, hour,
                      duration, is_locked, is_placed, placement_source,
                      created_at, updated_at
               FROM distribution_block
               ORDER BY block_id"#,
        )?;
        let mut blocks = stmt
            .query_map([], |row| Self::map_row(row))?
            .collect::<Result<Vec<DistributionBlock>, _>>()?;

        let mut teacher_stmt = conn.prepare(
            "SELECT block_id, teacher_id FROM block_teacher ORDER BY block_id, teacher_id",
        )?;
        let pairs = teacher_stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<(String, String)>, _>>()?;

        // 合并教师关联 (blocks 与 pairs 均按 block_id 有序)
        let mut idx = 0usize;
        for (block_id, teacher_id) in pairs {
            while idx < blocks.len() && blocks[idx].block_id < block_id {
                idx += 1;
            }
            if idx < blocks.len() && blocks[idx].block_id == block_id {
                blocks[idx].teacher_ids.push(teacher_id);
            }
        }

        Ok(blocks)
    }

    /// 按ID查询教学块
    pub fn find_by_id(&self, block_id: &str) -> RepositoryResult<Option<DistributionBlock>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT block_id, class_id, lesson_code, room_id, day, hour,
                      duration, is_locked, is_placed, placement_source,
                      created_at, updated_at
               FROM distribution_block
               WHERE block_id = ?"#,
        )?;
        let block = stmt
            .query_map(params![block_id], |row| Self::map_row(row))?
            .next()
            .transpose()?;

        let Some(mut block) = block else {
            return Ok(None);
        };

        let mut teacher_stmt = conn.prepare(
            "SELECT teacher_id FROM block_teacher WHERE block_id = ? ORDER BY teacher_id",
        )?;
        block.teacher_ids = teacher_stmt
            .query_map(params![block_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(Some(block))
    }

    /// 设置锁定标志
    pub fn set_locked(&self, block_id: &str, locked: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE distribution_block SET is_locked = ?, updated_at = ? WHERE block_id = ?",
            params![if locked { 1 } else { 0 }, Utc::now().naive_utc(), block_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "DistributionBlock".to_string(),
                id: block_id.to_string(),
            });
        }
        Ok(())
    }

    /// 清除教学块落位 (含占用簿记)
    pub fn clear_placement(&self, block_id: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::clear_placement_tx(&tx, block_id)?;

        tx.commit()?;
        Ok(())
    }

    /// 落位教学块到 (day, hour) 并重建该块占用簿记
    pub fn place_block(
        &self,
        block_id: &str,
        day: u8,
        hour: u8,
        source: PlacementSource,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        Self::place_block_tx(&tx, block_id, day, hour, source)?;

        tx.commit()?;
        Ok(())
    }

    /// 重建派生占用表 (slot_occupancy 全量重建)
    pub fn sync_derived_tables(&self) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::sync_derived_tables_tx(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// 原子应用变更集
    ///
    /// # 事务内步骤 (逐条变更)
    /// 1. 校验教学块存在且未锁定
    /// 2. 清除该块旧落位簿记
    /// 3. 写入新 (day, hour), 标记 MANUAL 落位
    /// 最后重建派生占用表并写入操作日志; 任一步失败整体回滚
    ///
    /// # 返回
    /// - `Ok(count)`: 应用成功的变更条数
    pub fn apply_change_set(&self, changes: &[BlockMove], actor: &str) -> RepositoryResult<usize> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        for change in changes {
            let (exists, is_locked): (bool, bool) = {
                let mut stmt =
                    tx.prepare("SELECT is_locked FROM distribution_block WHERE block_id = ?")?;
                let row = stmt
                    .query_map(params![&change.block_id], |row| {
                        Ok(row.get::<_, i32>(0)? == 1)
                    })?
                    .next()
                    .transpose()?;
                match row {
                    Some(locked) => (true, locked),
                    None => (false, false),
                }
            };

            if !exists {
                return Err(RepositoryError::NotFound {
                    entity: "DistributionBlock".to_string(),
                    id: change.block_id.clone(),
                });
            }
            if is_locked {
                return Err(RepositoryError::BusinessRuleViolation(format!(
                    "教学块 {} 已锁定, 变更集被拒绝",
                    change.block_id
                )));
            }

            Self::clear_placement_tx(&tx, &change.block_id)?;
            Self::place_block_tx(
                &tx,
                &change.block_id,
                change.new_day,
                change.new_hour,
                PlacementSource::Manual,
            )?;
        }

        Self::sync_derived_tables_tx(&tx)?;

        // 红线: 所有课表写入必须留痕
        let log = ActionLog::new(ActionType::CascadeApply, actor)
            .with_block_id(&changes[0].block_id)
            .with_payload(&changes)
            .with_detail(format!("应用级联变更集: 共 {} 个教学块", changes.len()));
        ActionLogRepository::insert_with_conn(&tx, &log)?;

        tx.commit()?;
        info!(moves = changes.len(), actor = %actor, "变更集已落库");
        Ok(changes.len())
    }

    // ==========================================
    // 事务内辅助 (Transaction 解引用为 Connection)
    // ==========================================

    fn clear_placement_tx(conn: &Connection, block_id: &str) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM slot_occupancy WHERE block_id = ?",
            params![block_id],
        )?;
        let updated = conn.execute(
            r#"UPDATE distribution_block
               SET day = NULL, hour = NULL, is_placed = 0, updated_at = ?
               WHERE block_id = ?"#,
            params![Utc::now().naive_utc(), block_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "DistributionBlock".to_string(),
                id: block_id.to_string(),
            });
        }
        Ok(())
    }

    fn place_block_tx(
        conn: &Connection,
        block_id: &str,
        day: u8,
        hour: u8,
        source: PlacementSource,
    ) -> RepositoryResult<()> {
        let updated = conn.execute(
            r#"UPDATE distribution_block
               SET day = ?, hour = ?, is_placed = 1, placement_source = ?, updated_at = ?
               WHERE block_id = ?"#,
            params![day, hour, source.as_str(), Utc::now().naive_utc(), block_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "DistributionBlock".to_string(),
                id: block_id.to_string(),
            });
        }

        // 该块占用簿记
        let mut stmt = conn.prepare(
            r#"SELECT block_id, class_id, lesson_code, room_id, day, hour,
                      duration, is_locked, is_placed, placement_source,
                      created_at, updated_at
               FROM distribution_block WHERE block_id = ?"#,
        )?;
        let mut block = stmt
            .query_map(params![block_id], |row| Self::map_row(row))?
            .next()
            .transpose()?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "DistributionBlock".to_string(),
                id: block_id.to_string(),
            })?;

        let mut teacher_stmt = conn.prepare(
            "SELECT teacher_id FROM block_teacher WHERE block_id = ? ORDER BY teacher_id",
        )?;
        block.teacher_ids = teacher_stmt
            .query_map(params![block_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Self::insert_occupancy_rows(conn, &block, day, hour)?;
        Ok(())
    }

    fn insert_occupancy_rows(
        conn: &Connection,
        block: &DistributionBlock,
        day: u8,
        hour: u8,
    ) -> RepositoryResult<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO slot_occupancy (entity_kind, entity_id, day, hour, block_id) VALUES (?, ?, ?, ?, ?)",
        )?;
        for h in hour..hour + block.duration {
            stmt.execute(params![
                EntityKind::Class.as_str(),
                &block.class_id,
                day,
                h,
                &block.block_id
            ])?;
            for teacher_id in &block.teacher_ids {
                stmt.execute(params![
                    EntityKind::Teacher.as_str(),
                    teacher_id,
                    day,
                    h,
                    &block.block_id
                ])?;
            }
            if let Some(room_id) = &block.room_id {
                stmt.execute(params![
                    EntityKind::Room.as_str(),
                    room_id,
                    day,
                    h,
                    &block.block_id
                ])?;
            }
        }
        Ok(())
    }

    fn sync_derived_tables_tx(conn: &Connection) -> RepositoryResult<()> {
        conn.execute("DELETE FROM slot_occupancy", [])?;

        let blocks: Vec<DistributionBlock> = {
            let mut stmt = conn.prepare(
                r#"SELECT block_id, class_id, lesson_code, room_id, day, hour,
                          duration, is_locked, is_placed, placement_source,
                          created_at, updated_at
                   FROM distribution_block
                   WHERE is_placed = 1 AND day IS NOT NULL AND hour IS NOT NULL
                   ORDER BY block_id"#,
            )?;
            stmt.query_map([], |row| Self::map_row(row))?
                .collect::<Result<Vec<DistributionBlock>, _>>()?
        };

        let mut teacher_stmt = conn.prepare(
            "SELECT teacher_id FROM block_teacher WHERE block_id = ? ORDER BY teacher_id",
        )?;
        for mut block in blocks {
            block.teacher_ids = teacher_stmt
                .query_map(params![&block.block_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<String>, _>>()?;
            if let Some((day, hour)) = block.window() {
                Self::insert_occupancy_rows(conn, &block, day, hour)?;
            }
        }

        Ok(())
    }

    /// 映射数据库行到 DistributionBlock 对象 (教师集合由调用方补充)
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<DistributionBlock> {
        let source_str: String = row.get(9)?;
        Ok(DistributionBlock {
            block_id: row.get(0)?,
            class_id: row.get(1)?,
            lesson_code: row.get(2)?,
            // 教师集合由调用方从 block_teacher 表补充
            teacher_ids: Vec::new(),
            room_id: row.get(3)?,
            day: row.get(4)?,
            hour: row.get(5)?,
            duration: row.get(6)?,
            is_locked: row.get::<_, i32>(7)? == 1,
            is_placed: row.get::<_, i32>(8)? == 1,
            placement_source: PlacementSource::from_str(&source_str)
                .unwrap_or(PlacementSource::Calc),
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}
