// ==========================================
// 学校排课系统 - 约束实体领域模型
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 3. 数据模型
// 约束分层: 学校默认课表 -> 实体约束覆盖 -> 单元格课表覆盖(可重新开放)
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::types::{SlotState, TimeSlot};

/// 默认教学日数 (settings 行缺失时的兜底)
pub const DEFAULT_MAX_DAYS: u8 = 5;

/// 默认每日节数 (settings 行缺失时的兜底)
pub const DEFAULT_MAX_HOURS: u8 = 10;

// ==========================================
// Teacher - 教师
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub teacher_id: String,                         // 教师ID
    pub teacher_name: String,                       // 姓名
    pub constraints: HashMap<TimeSlot, SlotState>,  // 实体约束覆盖
    pub schedule_overrides: HashMap<String, SlotState>, // 单元格覆盖, 键为 "day_hour"
    pub max_daily_hours: Option<u8>,                // 日课时上限 (可选)
    pub max_weekly_hours: Option<u8>,               // 周课时上限 (可选)
}

impl Teacher {
    pub fn new(teacher_id: &str, teacher_name: &str) -> Self {
        Self {
            teacher_id: teacher_id.to_string(),
            teacher_name: teacher_name.to_string(),
            constraints: HashMap::new(),
            schedule_overrides: HashMap::new(),
            max_daily_hours: None,
            max_weekly_hours: None,
        }
    }
}

// ==========================================
// SchoolClass - 班级
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolClass {
    pub class_id: String,                           // 班级ID
    pub class_name: String,                         // 班级名称
    pub constraints: HashMap<TimeSlot, SlotState>,  // 实体约束覆盖
    pub schedule_overrides: HashMap<String, SlotState>, // 单元格覆盖, 键为 "day_hour"
}

impl SchoolClass {
    pub fn new(class_id: &str, class_name: &str) -> Self {
        Self {
            class_id: class_id.to_string(),
            class_name: class_name.to_string(),
            constraints: HashMap::new(),
            schedule_overrides: HashMap::new(),
        }
    }
}

// ==========================================
// Room - 教室
// ==========================================
// 说明: 教室约束表仅服务于可用性查询, 落位合法性对教室只做占用冲突判定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,                            // 教室ID
    pub room_name: String,                          // 教室名称
    pub constraints: HashMap<TimeSlot, SlotState>,  // 实体约束覆盖
}

impl Room {
    pub fn new(room_id: &str, room_name: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            room_name: room_name.to_string(),
            constraints: HashMap::new(),
        }
    }
}

// ==========================================
// SchoolSettings - 学校全局设置
// ==========================================
// 默认课表约定:
// - hour <= max_hours 的单元格缺省视为 OPEN
// - hour >  max_hours 的单元格缺省视为 CLOSED, 仅显式 OPEN 条目可延长当日节数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolSettings {
    pub max_days: u8,                                    // 教学日数
    pub max_hours: u8,                                   // 每日配置节数
    pub default_timetable: HashMap<TimeSlot, SlotState>, // 学校默认课表
}

impl SchoolSettings {
    pub fn new(max_days: u8, max_hours: u8) -> Self {
        Self {
            max_days,
            max_hours,
            default_timetable: HashMap::new(),
        }
    }

    /// 有效每日最大节数
    ///
    /// 默认课表中存在超出配置节数的显式 OPEN 单元格时, 以其最大节次为准
    pub fn effective_max_hours(&self) -> u8 {
        let beyond = self
            .default_timetable
            .iter()
            .filter(|(slot, state)| state.is_open() && slot.hour > self.max_hours)
            .map(|(slot, _)| slot.hour)
            .max();
        beyond.map_or(self.max_hours, |h| h.max(self.max_hours))
    }

    /// 学校默认课表在指定时段的状态
    pub fn default_state(&self, slot: TimeSlot) -> SlotState {
        if let Some(state) = self.default_timetable.get(&slot) {
            return *state;
        }
        if slot.hour <= self.max_hours {
            SlotState::Open
        } else {
            SlotState::Closed
        }
    }
}

impl Default for SchoolSettings {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DAYS, DEFAULT_MAX_HOURS)
    }
}
