// ==========================================
// 学校排课系统 - 教学块领域模型
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 3. 数据模型 distribution_block
// 红线: 引擎只迁移已落位教学块, 不创建也不删除
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{PlacementSource, TimeSlot};

// ==========================================
// DistributionBlock - 教学块
// ==========================================
// 一个教学块 = 班级 × 课程 × 教师组 [× 教室] × 时段窗口
// 占用时段: 同一天的 [hour, hour + duration) 连续节次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionBlock {
    pub block_id: String,              // 教学块ID (跨移动稳定)
    pub class_id: String,              // 班级ID
    pub lesson_code: String,           // 课程代码
    pub teacher_ids: Vec<String>,      // 教师ID集合 (合班授课时 >= 2)
    pub room_id: Option<String>,       // 教室ID (可选)
    pub day: Option<u8>,               // 落位日 (未落位时为 None)
    pub hour: Option<u8>,              // 落位起始节 (未落位时为 None)
    pub duration: u8,                  // 连堂节数 (>= 1)
    pub is_locked: bool,               // 锁定: 级联调课不可触碰
    pub is_placed: bool,               // 是否已落位
    pub placement_source: PlacementSource, // 落位来源 (CALC/MANUAL)
    pub created_at: NaiveDateTime,     // 创建时间
    pub updated_at: NaiveDateTime,     // 更新时间
}

impl DistributionBlock {
    /// 当前落位窗口 (day, 起始hour); 未落位返回 None
    pub fn window(&self) -> Option<(u8, u8)> {
        match (self.is_placed, self.day, self.hour) {
            (true, Some(day), Some(hour)) => Some((day, hour)),
            _ => None,
        }
    }

    /// 当前落位起始时段; 未落位返回 None
    pub fn slot(&self) -> Option<TimeSlot> {
        self.window().map(|(day, hour)| TimeSlot::new(day, hour))
    }

    /// 是否涉及指定教师
    pub fn involves_teacher(&self, teacher_id: &str) -> bool {
        self.teacher_ids.iter().any(|t| t == teacher_id)
    }

    /// 是否与另一教学块共享教师 (合班/跨班教师冲突来源)
    pub fn shares_teacher(&self, other: &DistributionBlock) -> bool {
        self.teacher_ids.iter().any(|t| other.involves_teacher(t))
    }

    /// 是否与另一教学块共享教室
    pub fn shares_room(&self, other: &DistributionBlock) -> bool {
        match (&self.room_id, &other.room_id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// 是否与另一教学块共享任一资源 (教师/班级/教室)
    pub fn shares_resource(&self, other: &DistributionBlock) -> bool {
        self.class_id == other.class_id || self.shares_teacher(other) || self.shares_room(other)
    }

    /// 两个同日窗口是否重叠 (不同日恒不重叠)
    pub fn window_overlaps(day_a: u8, hour_a: u8, dur_a: u8, day_b: u8, hour_b: u8, dur_b: u8) -> bool {
        if day_a != day_b {
            return false;
        }
        // 半开区间 [hour, hour + duration) 重叠判定
        let end_a = hour_a as u16 + dur_a as u16;
        let end_b = hour_b as u16 + dur_b as u16;
        (hour_a as u16) < end_b && (hour_b as u16) < end_a
    }
}
