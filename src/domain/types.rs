// ==========================================
// 学校排课系统 - 领域类型定义
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 3. 数据模型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// TimeSlot - 时段 (天, 节)
// ==========================================
// 不可变值对象, 相等性按 (day, hour)
// day/hour 均为 1 起始
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: u8,
    pub hour: u8,
}

impl TimeSlot {
    pub fn new(day: u8, hour: u8) -> Self {
        Self { day, hour }
    }

    /// 生成 "day_hour" 形式的单元格键 (课表覆盖表的主键格式)
    pub fn slot_key(&self) -> String {
        format!("{}_{}", self.day, self.hour)
    }

    /// 从 "day_hour" 单元格键解析
    pub fn from_slot_key(key: &str) -> Option<Self> {
        let (day, hour) = key.split_once('_')?;
        let day = day.trim().parse::<u8>().ok()?;
        let hour = hour.trim().parse::<u8>().ok()?;
        if day == 0 || hour == 0 {
            return None;
        }
        Some(Self { day, hour })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "第{}天第{}节", self.day, self.hour)
    }
}

// ==========================================
// SlotState - 时段状态
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    Open,   // 开放
    Closed, // 封闭
}

impl SlotState {
    pub fn is_open(&self) -> bool {
        matches!(self, SlotState::Open)
    }

    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Open => "OPEN",
            SlotState::Closed => "CLOSED",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(SlotState::Open),
            "CLOSED" => Some(SlotState::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// EntityKind - 约束实体类型
// ==========================================
// 用途: 约束表/占用表的实体区分, 冲突消息的实体命名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    School,  // 学校 (全局默认课表)
    Teacher, // 教师
    Class,   // 班级
    Room,    // 教室
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::School => "SCHOOL",
            EntityKind::Teacher => "TEACHER",
            EntityKind::Class => "CLASS",
            EntityKind::Room => "ROOM",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCHOOL" => Some(EntityKind::School),
            "TEACHER" => Some(EntityKind::Teacher),
            "CLASS" => Some(EntityKind::Class),
            "ROOM" => Some(EntityKind::Room),
            _ => None,
        }
    }

    /// 中文名称 (用于冲突消息)
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::School => "学校",
            EntityKind::Teacher => "教师",
            EntityKind::Class => "班级",
            EntityKind::Room => "教室",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ==========================================
// PlacementSource - 排课来源
// ==========================================
// CALC: 自动分配器落位; MANUAL: 人工调课落位
// 红线: 落库应用变更集时必须标记为 MANUAL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementSource {
    Calc,   // 自动排课
    Manual, // 人工调课
}

impl PlacementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementSource::Calc => "CALC",
            PlacementSource::Manual => "MANUAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CALC" => Some(PlacementSource::Calc),
            "MANUAL" => Some(PlacementSource::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for PlacementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
