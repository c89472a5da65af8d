// ==========================================
// 学校排课系统 - 级联调课引擎
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 4.2 级联搜索
// 职责: 给定单块移动请求, 推演最小可行的级联变更集
// 红线: 纯函数, 不回写快照; 失败时不返回任何部分变更
// 红线: 锁定块既不可作为源, 也不可被挤出
// ==========================================

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::domain::block::DistributionBlock;
use crate::domain::snapshot::{PlacementView, ScheduleSnapshot};
use crate::domain::types::TimeSlot;
use crate::engine::availability::{AvailabilityEvaluator, PlacementConflict};

// ==========================================
// CascadeLimits - 级联搜索边界
// ==========================================
// 超出任一边界时整个解算中止 (全有或全无)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeLimits {
    pub max_chain_depth: u32,    // 挤出链最大深度
    pub max_touched_blocks: usize, // 单次解算最多移动块数 (含源块)
}

impl Default for CascadeLimits {
    fn default() -> Self {
        Self {
            max_chain_depth: 4,
            max_touched_blocks: 12,
        }
    }
}

// ==========================================
// BlockMove - 单块迁移记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMove {
    pub block_id: String,
    pub new_day: u8,
    pub new_hour: u8,
}

// ==========================================
// MoveFailure - 调课失败原因
// ==========================================
// 领域失败以结果值返回, 不走 Err 通道
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveFailure {
    #[error("教学块 {block_id} 不存在")]
    BlockNotFound { block_id: String },

    #[error("教学块 {block_id} 尚未落位, 无法调课")]
    BlockNotPlaced { block_id: String },

    #[error("教学块 {block_id} 已锁定, 不可移动")]
    BlockLocked { block_id: String },

    #[error("目标时段越界: 第{day}天第{hour}节")]
    TargetOutOfBounds { day: u8, hour: u8 },

    #[error("目标时段不可用: {conflict}")]
    TargetClosed { conflict: PlacementConflict },

    #[error("目标时段被锁定教学块 {block_id} 占用, 锁定块不可被挤出")]
    LockedOccupant { block_id: String },

    #[error("无法为教学块 {block_id} 找到可行时段, 级联调课中止")]
    NoSlotForBlock { block_id: String },

    #[error("级联深度超限: 安置教学块 {block_id} 超出最大深度 {max_depth}")]
    DepthExceeded { block_id: String, max_depth: u32 },

    #[error("级联规模超限: 安置教学块 {block_id} 将超过最多 {max_blocks} 个移动块")]
    BudgetExceeded { block_id: String, max_blocks: usize },
}

// ==========================================
// MoveResult - 调课解算结果
// ==========================================
// changes 顺序: 源块在前, 其后按解算顺序排列被挤出块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub success: bool,
    pub message: String,
    pub changes: Vec<BlockMove>,
    pub failure: Option<MoveFailure>,
}

impl MoveResult {
    fn succeeded(message: String, changes: Vec<BlockMove>) -> Self {
        Self {
            success: true,
            message,
            changes,
            failure: None,
        }
    }

    fn failed(failure: MoveFailure) -> Self {
        Self {
            success: false,
            message: failure.to_string(),
            changes: Vec::new(),
            failure: Some(failure),
        }
    }

    /// 成功且无需任何移动 (目标时段即当前时段)
    pub fn is_no_op(&self) -> bool {
        self.success && self.changes.is_empty()
    }
}

/// 候选时段搜索结论
enum RelocationOutcome {
    Free(TimeSlot),     // 完全空闲时段
    Displace(TimeSlot), // 需进一步挤出未锁定块的时段
    None,               // 无任何可行时段
}

// ==========================================
// CascadeEngine - 级联调课引擎
// ==========================================
pub struct CascadeEngine {
    limits: CascadeLimits,
}

impl CascadeEngine {
    pub fn new(limits: CascadeLimits) -> Self {
        Self { limits }
    }

    /// 解算单块移动请求
    ///
    /// # 参数
    /// - `snapshot`: 只读课表快照
    /// - `block_id`: 源教学块ID
    /// - `target_day` / `target_hour`: 目标窗口起点 (源块时长不变)
    ///
    /// # 返回
    /// - 成功: `changes` 为源块加被挤出块的完整迁移列表
    /// - 失败: `changes` 恒为空, `message` 指明原因
    ///
    /// # 确定性
    /// 相同快照与请求恒产生相同结果: 候选扫描按天优先/节次次之/最早在前,
    /// 被挤出集按块ID字典序处理, 无随机性
    #[instrument(skip(self, snapshot), fields(block_id = %block_id, target_day, target_hour))]
    pub fn resolve_move(
        &self,
        snapshot: &ScheduleSnapshot,
        block_id: &str,
        target_day: u8,
        target_hour: u8,
    ) -> MoveResult {
        // ===== Step 1: 快速失败检查 =====
        let source = match snapshot.block(block_id) {
            Some(b) => b,
            None => {
                return MoveResult::failed(MoveFailure::BlockNotFound {
                    block_id: block_id.to_string(),
                })
            }
        };

        let (cur_day, cur_hour) = match source.window() {
            Some(w) => w,
            None => {
                return MoveResult::failed(MoveFailure::BlockNotPlaced {
                    block_id: block_id.to_string(),
                })
            }
        };

        if source.is_locked {
            return MoveResult::failed(MoveFailure::BlockLocked {
                block_id: block_id.to_string(),
            });
        }

        // ===== Step 2: 目标窗口边界 =====
        let settings = &snapshot.settings;
        let eff_max_hours = settings.effective_max_hours() as u16;
        if target_day == 0
            || target_hour == 0
            || target_day > settings.max_days
            || target_hour as u16 + source.duration as u16 - 1 > eff_max_hours
        {
            return MoveResult::failed(MoveFailure::TargetOutOfBounds {
                day: target_day,
                hour: target_hour,
            });
        }

        // ===== Step 3: 原位请求 (无操作) =====
        if (cur_day, cur_hour) == (target_day, target_hour) {
            return MoveResult::succeeded(
                "目标时段即当前时段, 无需移动".to_string(),
                Vec::new(),
            );
        }

        // ===== Step 4: 目标窗口封闭判定 =====
        if let Err(conflict) =
            AvailabilityEvaluator::window_open_for_block(snapshot, source, target_day, target_hour)
        {
            return MoveResult::failed(MoveFailure::TargetClosed { conflict });
        }

        // ===== Step 5: 目标窗口锁定占用判定 =====
        let no_pending = HashMap::new();
        {
            let view = PlacementView::new(snapshot, &no_pending);
            if let Some(locked) = view
                .overlapping_blocks(source, target_day, target_hour)
                .iter()
                .find(|b| b.is_locked)
            {
                return MoveResult::failed(MoveFailure::LockedOccupant {
                    block_id: locked.block_id.clone(),
                });
            }
        }

        // ===== Step 6: 有界广度优先挤出解算 =====
        let mut changes: Vec<BlockMove> = Vec::new();
        let mut pending: HashMap<String, TimeSlot> = HashMap::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();

        Self::claim(
            &mut changes,
            &mut pending,
            block_id,
            TimeSlot::new(target_day, target_hour),
        );
        queue.push_back((block_id.to_string(), 0));

        while let Some((current_id, depth)) = queue.pop_front() {
            let Some(current) = snapshot.block(&current_id) else {
                continue;
            };
            let Some(slot) = pending.get(&current_id).copied() else {
                continue;
            };

            // 被挤出集: 与当前块新窗口共享资源且重叠的非待定块 (按ID字典序)
            let displaced_ids: Vec<String> = {
                let view = PlacementView::new(snapshot, &pending);
                view.overlapping_blocks(current, slot.day, slot.hour)
                    .into_iter()
                    .filter(|b| !pending.contains_key(&b.block_id))
                    .map(|b| b.block_id.clone())
                    .collect()
            };

            debug!(
                block_id = %current_id,
                day = slot.day,
                hour = slot.hour,
                displaced = displaced_ids.len(),
                "级联步骤"
            );

            for displaced_id in displaced_ids {
                let Some(displaced) = snapshot.block(&displaced_id) else {
                    continue;
                };

                // 选位阶段已排除锁定块, 此处兜底
                if displaced.is_locked {
                    return MoveResult::failed(MoveFailure::LockedOccupant {
                        block_id: displaced_id,
                    });
                }

                if changes.len() + 1 > self.limits.max_touched_blocks {
                    return MoveResult::failed(MoveFailure::BudgetExceeded {
                        block_id: displaced_id,
                        max_blocks: self.limits.max_touched_blocks,
                    });
                }

                match Self::find_relocation(snapshot, &pending, displaced) {
                    RelocationOutcome::Free(new_slot) => {
                        Self::claim(&mut changes, &mut pending, &displaced_id, new_slot);
                    }
                    RelocationOutcome::Displace(new_slot) => {
                        if depth + 1 >= self.limits.max_chain_depth {
                            return MoveResult::failed(MoveFailure::DepthExceeded {
                                block_id: displaced_id,
                                max_depth: self.limits.max_chain_depth,
                            });
                        }
                        Self::claim(&mut changes, &mut pending, &displaced_id, new_slot);
                        queue.push_back((displaced_id, depth + 1));
                    }
                    RelocationOutcome::None => {
                        return MoveResult::failed(MoveFailure::NoSlotForBlock {
                            block_id: displaced_id,
                        });
                    }
                }
            }
        }

        // ===== Step 7: 输出变更集 =====
        let message = format!("调课完成: 共移动 {} 个教学块", changes.len());
        debug!(moves = changes.len(), "级联解算成功");
        MoveResult::succeeded(message, changes)
    }

    /// 记录一条待定迁移
    fn claim(
        changes: &mut Vec<BlockMove>,
        pending: &mut HashMap<String, TimeSlot>,
        block_id: &str,
        slot: TimeSlot,
    ) {
        pending.insert(block_id.to_string(), slot);
        changes.push(BlockMove {
            block_id: block_id.to_string(),
            new_day: slot.day,
            new_hour: slot.hour,
        });
    }

    /// 为被挤出块搜索新时段
    ///
    /// 扫描顺序固定: 天优先, 节次次之, 最早在前; 跳过块自身当前窗口
    /// 第一遍找完全空闲时段; 第二遍找仅被未锁定且非待定块占用的时段
    fn find_relocation(
        snapshot: &ScheduleSnapshot,
        pending: &HashMap<String, TimeSlot>,
        block: &DistributionBlock,
    ) -> RelocationOutcome {
        let settings = &snapshot.settings;
        let eff_max_hours = settings.effective_max_hours();
        if block.duration == 0 || block.duration > eff_max_hours {
            return RelocationOutcome::None;
        }
        let last_start = eff_max_hours - block.duration + 1;
        let current = block.window();

        // ----- 第一遍: 完全空闲时段 -----
        for day in 1..=settings.max_days {
            for hour in 1..=last_start {
                if current == Some((day, hour)) {
                    continue;
                }
                let view = PlacementView::new(snapshot, pending);
                if AvailabilityEvaluator::can_place_block(&view, block, day, hour).is_ok() {
                    return RelocationOutcome::Free(TimeSlot::new(day, hour));
                }
            }
        }

        // ----- 第二遍: 可通过继续挤出解决的时段 -----
        for day in 1..=settings.max_days {
            for hour in 1..=last_start {
                if current == Some((day, hour)) {
                    continue;
                }
                if AvailabilityEvaluator::window_open_for_block(snapshot, block, day, hour).is_err() {
                    continue;
                }

                let view = PlacementView::new(snapshot, pending);
                let occupants = view.overlapping_blocks(block, day, hour);
                if occupants.is_empty() {
                    // 第一遍已拒绝 (如课时上限), 挤出无助于解决
                    continue;
                }
                if occupants
                    .iter()
                    .any(|b| b.is_locked || pending.contains_key(&b.block_id))
                {
                    continue;
                }

                // 课时上限判定: 占用者将被挤走, 不计入
                let mut exclude: Vec<&str> = vec![block.block_id.as_str()];
                exclude.extend(occupants.iter().map(|b| b.block_id.as_str()));
                if AvailabilityEvaluator::teacher_caps_ok(&view, block, day, &exclude).is_err() {
                    continue;
                }

                return RelocationOutcome::Displace(TimeSlot::new(day, hour));
            }
        }

        RelocationOutcome::None
    }
}
