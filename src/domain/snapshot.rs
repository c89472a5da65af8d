// ==========================================
// 学校排课系统 - 课表快照
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 2. 系统总览 数据流
// 红线: 快照只读, 引擎不得回写; 级联计算通过待定变更叠加层推演
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::domain::block::DistributionBlock;
use crate::domain::school::{Room, SchoolClass, SchoolSettings, Teacher};
use crate::domain::types::{EntityKind, SlotState, TimeSlot};

// ==========================================
// ScheduleSnapshot - 课表快照
// ==========================================
// 一次级联计算的全部输入: 设置 + 全量教学块 + 实体约束
// BTreeMap 保证遍历按ID字典序, 级联结果可复现
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub settings: SchoolSettings,
    pub blocks: BTreeMap<String, DistributionBlock>,
    pub teachers: BTreeMap<String, Teacher>,
    pub classes: BTreeMap<String, SchoolClass>,
    pub rooms: BTreeMap<String, Room>,
}

impl ScheduleSnapshot {
    pub fn new(settings: SchoolSettings) -> Self {
        Self {
            settings,
            blocks: BTreeMap::new(),
            teachers: BTreeMap::new(),
            classes: BTreeMap::new(),
            rooms: BTreeMap::new(),
        }
    }

    pub fn block(&self, block_id: &str) -> Option<&DistributionBlock> {
        self.blocks.get(block_id)
    }

    /// 已落位教学块 (按ID字典序)
    pub fn placed_blocks(&self) -> impl Iterator<Item = &DistributionBlock> {
        self.blocks.values().filter(|b| b.window().is_some())
    }

    /// 实体在指定时段的有效状态
    ///
    /// 解析顺序: 学校默认课表 -> 实体约束覆盖 -> 单元格课表覆盖
    /// 未登记实体仅受学校默认课表约束
    pub fn effective_slot_state(&self, kind: EntityKind, entity_id: &str, slot: TimeSlot) -> SlotState {
        let mut state = self.settings.default_state(slot);

        let (constraints, overrides): (
            Option<&HashMap<TimeSlot, SlotState>>,
            Option<&HashMap<String, SlotState>>,
        ) = match kind {
            EntityKind::School => (None, None),
            EntityKind::Teacher => self
                .teachers
                .get(entity_id)
                .map(|t| (Some(&t.constraints), Some(&t.schedule_overrides)))
                .unwrap_or((None, None)),
            EntityKind::Class => self
                .classes
                .get(entity_id)
                .map(|c| (Some(&c.constraints), Some(&c.schedule_overrides)))
                .unwrap_or((None, None)),
            EntityKind::Room => (self.rooms.get(entity_id).map(|r| &r.constraints), None),
        };

        if let Some(map) = constraints {
            if let Some(s) = map.get(&slot) {
                state = *s;
            }
        }
        // 单元格覆盖最后应用, 可重新开放被封闭的时段
        if let Some(map) = overrides {
            if let Some(s) = map.get(&slot.slot_key()) {
                state = *s;
            }
        }

        state
    }
}

// ==========================================
// PlacementView - 占位推演视图
// ==========================================
// 快照 + 本次级联的待定变更叠加层:
// 待定块占用新窗口并腾出旧窗口, 其余块保持快照落位
pub struct PlacementView<'a> {
    snapshot: &'a ScheduleSnapshot,
    pending: &'a HashMap<String, TimeSlot>,
}

impl<'a> PlacementView<'a> {
    pub fn new(snapshot: &'a ScheduleSnapshot, pending: &'a HashMap<String, TimeSlot>) -> Self {
        Self { snapshot, pending }
    }

    pub fn snapshot(&self) -> &'a ScheduleSnapshot {
        self.snapshot
    }

    /// 教学块在叠加层下的有效窗口
    pub fn effective_window(&self, block: &DistributionBlock) -> Option<(u8, u8)> {
        if let Some(slot) = self.pending.get(&block.block_id) {
            return Some((slot.day, slot.hour));
        }
        block.window()
    }

    /// 指定块是否已进入待定变更集
    pub fn is_pending(&self, block_id: &str) -> bool {
        self.pending.contains_key(block_id)
    }

    /// subject 以 (day, hour) 为起点落位时, 与之共享资源且窗口重叠的其他教学块
    ///
    /// 返回顺序按块ID字典序 (BTreeMap 遍历序), 保证级联可复现
    pub fn overlapping_blocks(
        &self,
        subject: &DistributionBlock,
        day: u8,
        hour: u8,
    ) -> Vec<&'a DistributionBlock> {
        self.snapshot
            .blocks
            .values()
            .filter(|b| b.block_id != subject.block_id)
            .filter(|b| subject.shares_resource(b))
            .filter(|b| match self.effective_window(b) {
                Some((b_day, b_hour)) => DistributionBlock::window_overlaps(
                    day,
                    hour,
                    subject.duration,
                    b_day,
                    b_hour,
                    b.duration,
                ),
                None => false,
            })
            .collect()
    }

    /// 教师在指定日已占用的课时数 (叠加层口径, 可排除若干块)
    pub fn teacher_hours_on_day(&self, teacher_id: &str, day: u8, exclude: &[&str]) -> u16 {
        self.snapshot
            .blocks
            .values()
            .filter(|b| b.involves_teacher(teacher_id))
            .filter(|b| !exclude.contains(&b.block_id.as_str()))
            .filter(|b| matches!(self.effective_window(b), Some((b_day, _)) if b_day == day))
            .map(|b| b.duration as u16)
            .sum()
    }

    /// 教师全周已占用课时数 (叠加层口径, 可排除若干块)
    pub fn teacher_hours_in_week(&self, teacher_id: &str, exclude: &[&str]) -> u16 {
        self.snapshot
            .blocks
            .values()
            .filter(|b| b.involves_teacher(teacher_id))
            .filter(|b| !exclude.contains(&b.block_id.as_str()))
            .filter(|b| self.effective_window(b).is_some())
            .map(|b| b.duration as u16)
            .sum()
    }
}
