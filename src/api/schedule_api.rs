// ==========================================
// 学校排课系统 - 调课业务接口
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 5. 并发与资源模型
// 职责: 快照装配, 级联解算编排, 变更集落库, 锁定管理
// 红线: 同一课表同一时刻至多一个解算/落库操作在途
// 红线: 失败或过期的解算结果不得落库; 落库后必须重建快照
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::snapshot::ScheduleSnapshot;
use crate::engine::analysis::{DependencyAnalyzer, TeacherGraph};
use crate::engine::cascade::{CascadeEngine, MoveResult};
use crate::engine::validation::{ValidationEngine, ValidationReport};
use crate::repository::{ActionLogRepository, BlockRepository, TimetableRepository};

// ==========================================
// ScheduleApi - 调课业务接口
// ==========================================
pub struct ScheduleApi {
    block_repo: Arc<BlockRepository>,
    timetable_repo: Arc<TimetableRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config: Arc<ConfigManager>,
    // 在途操作互斥: 解算与落库共用同一把守卫
    op_guard: Mutex<()>,
}

impl ScheduleApi {
    /// 打开数据库并创建 ScheduleApi 实例
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从既有连接创建 ScheduleApi 实例 (各仓储共享同一连接)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = Arc::new(ConfigManager::from_connection(conn.clone())?);

        Ok(Self {
            block_repo: Arc::new(BlockRepository::new(conn.clone())),
            timetable_repo: Arc::new(TimetableRepository::new(conn.clone())),
            action_log_repo: Arc::new(ActionLogRepository::new(conn)),
            config,
            op_guard: Mutex::new(()),
        })
    }

    pub fn block_repo(&self) -> &BlockRepository {
        &self.block_repo
    }

    pub fn timetable_repo(&self) -> &TimetableRepository {
        &self.timetable_repo
    }

    /// 从持久化状态重建只读快照
    pub fn load_snapshot(&self) -> ApiResult<ScheduleSnapshot> {
        let blocks = self.block_repo.find_all()?;
        Ok(self.timetable_repo.load_snapshot(blocks)?)
    }

    /// 解算单块移动请求 (纯计算, 不落库)
    ///
    /// # 返回
    /// - `Ok(MoveResult)`: 解算结论 (领域失败也在其中, success=false)
    /// - `Err(ApiError)`: 基础设施故障或已有操作在途
    #[instrument(skip(self), fields(block_id = %block_id, target_day, target_hour))]
    pub fn propose_move(
        &self,
        block_id: &str,
        target_day: u8,
        target_hour: u8,
    ) -> ApiResult<MoveResult> {
        let _guard = self
            .op_guard
            .try_lock()
            .map_err(|_| ApiError::OperationInFlight)?;

        let snapshot = self.load_snapshot()?;
        let limits = self.config.get_cascade_limits()?;
        let engine = CascadeEngine::new(limits);

        let result = engine.resolve_move(&snapshot, block_id, target_day, target_hour);
        if !result.success {
            warn!(message = %result.message, "级联解算失败");
        }
        Ok(result)
    }

    /// 后台工作线程上解算移动请求
    ///
    /// 引擎本身为同步纯函数; 交互调用方通过本方法避免阻塞
    pub async fn propose_move_async(
        self: Arc<Self>,
        block_id: String,
        target_day: u8,
        target_hour: u8,
    ) -> ApiResult<MoveResult> {
        let api = self.clone();
        tokio::task::spawn_blocking(move || {
            api.propose_move(&block_id, target_day, target_hour)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("后台任务失败: {}", e)))?
    }

    /// 原子落库已确认的解算结果
    ///
    /// # 前置条件
    /// - `result.success == true` (失败结果直接拒绝)
    /// - 解算所用快照仍为当前持久化状态 (调用方负责串行化)
    ///
    /// # 返回
    /// - `Ok(count)`: 落库的变更条数 (原位请求为 0)
    #[instrument(skip(self, result), fields(moves = result.changes.len(), actor = %actor))]
    pub fn apply_move(&self, result: &MoveResult, actor: &str) -> ApiResult<usize> {
        let _guard = self
            .op_guard
            .try_lock()
            .map_err(|_| ApiError::OperationInFlight)?;

        if !result.success {
            return Err(ApiError::InvalidInput(format!(
                "失败的解算结果不可落库: {}",
                result.message
            )));
        }
        if result.changes.is_empty() {
            return Ok(0);
        }

        let count = self.block_repo.apply_change_set(&result.changes, actor)?;
        info!(moves = count, "调课变更集落库完成");
        Ok(count)
    }

    /// 锁定教学块 (锁定后不参与任何级联)
    pub fn lock_block(&self, block_id: &str, actor: &str) -> ApiResult<()> {
        self.block_repo.set_locked(block_id, true)?;
        let log = ActionLog::new(ActionType::Lock, actor)
            .with_block_id(block_id)
            .with_detail(format!("锁定教学块 {}", block_id));
        self.action_log_repo.insert(&log)?;
        Ok(())
    }

    /// 解锁教学块
    pub fn unlock_block(&self, block_id: &str, actor: &str) -> ApiResult<()> {
        self.block_repo.set_locked(block_id, false)?;
        let log = ActionLog::new(ActionType::Unlock, actor)
            .with_block_id(block_id)
            .with_detail(format!("解锁教学块 {}", block_id));
        self.action_log_repo.insert(&log)?;
        Ok(())
    }

    /// 课表四维评分校验 (只读)
    pub fn validate(&self) -> ApiResult<ValidationReport> {
        let snapshot = self.load_snapshot()?;
        Ok(ValidationEngine::validate(&snapshot))
    }

    /// 教师依赖/压力分析 (只读)
    pub fn analyze(&self) -> ApiResult<TeacherGraph> {
        let snapshot = self.load_snapshot()?;
        Ok(DependencyAnalyzer::analyze(&snapshot))
    }

    /// 最近操作日志
    pub fn recent_actions(&self, limit: i64) -> ApiResult<Vec<crate::domain::ActionLog>> {
        Ok(self.action_log_repo.find_recent(limit)?)
    }
}
