// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================
// 各集成测试按需取用, 未用到的构建方法不计警告
#![allow(dead_code)]

use chrono::Utc;
use std::collections::HashMap;

use school_timetable::domain::block::DistributionBlock;
use school_timetable::domain::school::{Room, SchoolClass, SchoolSettings, Teacher};
use school_timetable::domain::snapshot::ScheduleSnapshot;
use school_timetable::domain::types::{PlacementSource, SlotState, TimeSlot};

// ==========================================
// DistributionBlock 构建器
// ==========================================

pub struct BlockBuilder {
    block_id: String,
    class_id: String,
    lesson_code: String,
    teacher_ids: Vec<String>,
    room_id: Option<String>,
    day: Option<u8>,
    hour: Option<u8>,
    duration: u8,
    is_locked: bool,
    is_placed: bool,
}

impl BlockBuilder {
    pub fn new(block_id: &str) -> Self {
        Self {
            block_id: block_id.to_string(),
            class_id: "C1".to_string(),
            lesson_code: "MATH".to_string(),
            teacher_ids: vec!["T1".to_string()],
            room_id: None,
            day: None,
            hour: None,
            duration: 1,
            is_locked: false,
            is_placed: false,
        }
    }

    pub fn class(mut self, class_id: &str) -> Self {
        self.class_id = class_id.to_string();
        self
    }

    pub fn lesson(mut self, lesson_code: &str) -> Self {
        self.lesson_code = lesson_code.to_string();
        self
    }

    pub fn teachers(mut self, teacher_ids: &[&str]) -> Self {
        self.teacher_ids = teacher_ids.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn room(mut self, room_id: &str) -> Self {
        self.room_id = Some(room_id.to_string());
        self
    }

    pub fn at(mut self, day: u8, hour: u8) -> Self {
        self.day = Some(day);
        self.hour = Some(hour);
        self.is_placed = true;
        self
    }

    pub fn duration(mut self, duration: u8) -> Self {
        self.duration = duration;
        self
    }

    pub fn locked(mut self) -> Self {
        self.is_locked = true;
        self
    }

    pub fn build(self) -> DistributionBlock {
        DistributionBlock {
            block_id: self.block_id,
            class_id: self.class_id,
            lesson_code: self.lesson_code,
            teacher_ids: self.teacher_ids,
            room_id: self.room_id,
            day: self.day,
            hour: self.hour,
            duration: self.duration,
            is_locked: self.is_locked,
            is_placed: self.is_placed,
            placement_source: PlacementSource::Calc,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }
}

// ==========================================
// Teacher 构建器
// ==========================================

pub struct TeacherBuilder {
    teacher_id: String,
    teacher_name: String,
    constraints: HashMap<TimeSlot, SlotState>,
    schedule_overrides: HashMap<String, SlotState>,
    max_daily_hours: Option<u8>,
    max_weekly_hours: Option<u8>,
}

impl TeacherBuilder {
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

    pub fn closed(mut self, day: u8, hour: u8) -> Self {
        self.constraints
            .insert(TimeSlot::new(day, hour), SlotState::Closed);
        self
    }

    pub fn reopened(mut self, day: u8, hour: u8) -> Self {
        self.schedule_overrides
            .insert(TimeSlot::new(day, hour).slot_key(), SlotState::Open);
        self
    }

    pub fn daily_cap(mut self, cap: u8) -> Self {
        self.max_daily_hours = Some(cap);
        self
    }

    pub fn weekly_cap(mut self, cap: u8) -> Self {
        self.max_weekly_hours = Some(cap);
        self
    }

    pub fn build(self) -> Teacher {
        Teacher {
            teacher_id: self.teacher_id,
            teacher_name: self.teacher_name,
            constraints: self.constraints,
            schedule_overrides: self.schedule_overrides,
            max_daily_hours: self.max_daily_hours,
            max_weekly_hours: self.max_weekly_hours,
        }
    }
}

// ==========================================
// 快照组装
// ==========================================

/// 组装快照, 自动登记块引用到但未显式给出的教师/班级/教室
pub fn build_snapshot(
    max_days: u8,
    max_hours: u8,
    teachers: Vec<Teacher>,
    blocks: Vec<DistributionBlock>,
) -> ScheduleSnapshot {
    let mut snapshot = ScheduleSnapshot::new(SchoolSettings::new(max_days, max_hours));

    for teacher in teachers {
        snapshot.teachers.insert(teacher.teacher_id.clone(), teacher);
    }
    for block in &blocks {
        for t in &block.teacher_ids {
            snapshot
                .teachers
                .entry(t.clone())
                .or_insert_with(|| Teacher::new(t, t));
        }
        snapshot
            .classes
            .entry(block.class_id.clone())
            .or_insert_with(|| SchoolClass::new(&block.class_id, &block.class_id));
        if let Some(r) = &block.room_id {
            snapshot
                .rooms
                .entry(r.clone())
                .or_insert_with(|| Room::new(r, r));
        }
    }
    for block in blocks {
        snapshot.blocks.insert(block.block_id.clone(), block);
    }

    snapshot
}
