// ==========================================
// 学校排课系统 - 教师依赖分析引擎
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 4.4 依赖/压力分析服务
// 职责: 教师节点压力度量 + 教师间依赖边 (合班/班级/课程/教室)
// 红线: 只读快照, 不产生任何变更
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::snapshot::ScheduleSnapshot;
use crate::domain::types::{EntityKind, SlotState, TimeSlot};

// ==========================================
// RelationType - 依赖边类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Team,   // 合班授课
    Class,  // 共授班级
    Lesson, // 共授课程
    Room,   // 共用教室
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Team => "team",
            RelationType::Class => "class",
            RelationType::Lesson => "lesson",
            RelationType::Room => "room",
        }
    }

    fn label(&self, weight: u32) -> String {
        match self {
            RelationType::Team => format!("合班授课 {} 次", weight),
            RelationType::Class => format!("共授 {} 个班级", weight),
            RelationType::Lesson => format!("共授 {} 门课程", weight),
            RelationType::Room => format!("共用 {} 间教室", weight),
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// TeacherNode / TeacherEdge / TeacherGraph
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherNode {
    pub id: String,
    pub label: String,
    pub stress: f64,           // 压力: 已排课时 / 可用开放时段
    pub lesson_count: usize,   // 承担课程数
    pub class_count: usize,    // 授课班级数
    pub room_count: usize,     // 使用教室数
    pub relation_count: usize, // 关联边数
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherEdge {
    pub source: String,
    pub target: String,
    pub weight: u32,
    pub label: String,
    #[serde(rename = "type")]
    pub relation: RelationType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherGraph {
    pub nodes: Vec<TeacherNode>,
    pub edges: Vec<TeacherEdge>,
}

// ==========================================
// DependencyAnalyzer - 教师依赖分析引擎
// ==========================================
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    /// 分析整张课表快照, 输出教师依赖图
    ///
    /// 节点与边均按教师ID字典序输出, 结果稳定可复现
    pub fn analyze(snapshot: &ScheduleSnapshot) -> TeacherGraph {
        let teacher_ids: Vec<&String> = snapshot.teachers.keys().collect();

        // ----- 依赖边 (仅 a < b 的有序对) -----
        let mut edges: Vec<TeacherEdge> = Vec::new();
        for (i, a) in teacher_ids.iter().enumerate() {
            for b in teacher_ids.iter().skip(i + 1) {
                for (relation, weight) in Self::pair_weights(snapshot, a, b) {
                    if weight > 0 {
                        edges.push(TeacherEdge {
                            source: (*a).clone(),
                            target: (*b).clone(),
                            weight,
                            label: relation.label(weight),
                            relation,
                        });
                    }
                }
            }
        }

        // ----- 教师节点 -----
        let mut nodes: Vec<TeacherNode> = Vec::new();
        for teacher_id in &teacher_ids {
            let mut lessons: BTreeSet<&str> = BTreeSet::new();
            let mut classes: BTreeSet<&str> = BTreeSet::new();
            let mut rooms: BTreeSet<&str> = BTreeSet::new();
            let mut scheduled_hours = 0u32;

            for block in snapshot.blocks.values() {
                if !block.involves_teacher(teacher_id) {
                    continue;
                }
                lessons.insert(block.lesson_code.as_str());
                classes.insert(block.class_id.as_str());
                if let Some(room) = &block.room_id {
                    rooms.insert(room.as_str());
                }
                if block.window().is_some() {
                    scheduled_hours += block.duration as u32;
                }
            }

            let open_hours = Self::open_hours(snapshot, teacher_id);
            let stress = if open_hours == 0 {
                0.0
            } else {
                scheduled_hours as f64 / open_hours as f64
            };

            let relation_count = edges
                .iter()
                .filter(|e| &e.source == *teacher_id || &e.target == *teacher_id)
                .count();

            let label = snapshot
                .teachers
                .get(*teacher_id)
                .map(|t| t.teacher_name.clone())
                .unwrap_or_else(|| (*teacher_id).clone());

            nodes.push(TeacherNode {
                id: (*teacher_id).clone(),
                label,
                stress,
                lesson_count: lessons.len(),
                class_count: classes.len(),
                room_count: rooms.len(),
                relation_count,
            });
        }

        TeacherGraph { nodes, edges }
    }

    /// 一对教师的四类依赖权重 (固定顺序: team/class/lesson/room)
    fn pair_weights(snapshot: &ScheduleSnapshot, a: &str, b: &str) -> [(RelationType, u32); 4] {
        let mut team = 0u32;
        let mut classes_a: BTreeSet<&str> = BTreeSet::new();
        let mut classes_b: BTreeSet<&str> = BTreeSet::new();
        let mut lessons_a: BTreeSet<&str> = BTreeSet::new();
        let mut lessons_b: BTreeSet<&str> = BTreeSet::new();
        let mut rooms_a: BTreeSet<&str> = BTreeSet::new();
        let mut rooms_b: BTreeSet<&str> = BTreeSet::new();

        for block in snapshot.blocks.values() {
            let has_a = block.involves_teacher(a);
            let has_b = block.involves_teacher(b);
            if has_a && has_b {
                team += 1;
            }
            if has_a {
                classes_a.insert(block.class_id.as_str());
                lessons_a.insert(block.lesson_code.as_str());
                if let Some(r) = &block.room_id {
                    rooms_a.insert(r.as_str());
                }
            }
            if has_b {
                classes_b.insert(block.class_id.as_str());
                lessons_b.insert(block.lesson_code.as_str());
                if let Some(r) = &block.room_id {
                    rooms_b.insert(r.as_str());
                }
            }
        }

        [
            (RelationType::Team, team),
            (
                RelationType::Class,
                classes_a.intersection(&classes_b).count() as u32,
            ),
            (
                RelationType::Lesson,
                lessons_a.intersection(&lessons_b).count() as u32,
            ),
            (
                RelationType::Room,
                rooms_a.intersection(&rooms_b).count() as u32,
            ),
        ]
    }

    /// 教师全周有效开放时段数
    fn open_hours(snapshot: &ScheduleSnapshot, teacher_id: &str) -> u32 {
        let settings = &snapshot.settings;
        let mut open = 0u32;
        for day in 1..=settings.max_days {
            for hour in 1..=settings.effective_max_hours() {
                let slot = TimeSlot::new(day, hour);
                if snapshot.effective_slot_state(EntityKind::Teacher, teacher_id, slot)
                    == SlotState::Open
                {
                    open += 1;
                }
            }
        }
        open
    }
}
