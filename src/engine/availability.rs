// ==========================================
// 学校排课系统 - 可用性判定引擎
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 4.1 约束模型与可用性判定
// 职责: 时段有效状态查询 + 教学块落位合法性判定
// 红线: 纯函数, 只读快照, 所有否决必须输出 reason
// ==========================================

use thiserror::Error;

use crate::domain::block::DistributionBlock;
use crate::domain::snapshot::{PlacementView, ScheduleSnapshot};
use crate::domain::types::{EntityKind, TimeSlot};

// ==========================================
// PlacementConflict - 落位否决原因
// ==========================================
// 每个变体命名被违反的实体, 供调用方直接展示
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementConflict {
    #[error("时段越界: 第{day}天第{hour}节起 {duration} 节超出课表范围")]
    OutOfBounds { day: u8, hour: u8, duration: u8 },

    #[error("时段封闭: {kind} {entity_id} 在第{day}天第{hour}节不可用")]
    SlotClosed {
        kind: EntityKind,
        entity_id: String,
        day: u8,
        hour: u8,
    },

    #[error("教师冲突: 教师 {teacher_id} 在第{day}天第{hour}节已被教学块 {block_id} 占用")]
    TeacherBusy {
        teacher_id: String,
        block_id: String,
        day: u8,
        hour: u8,
    },

    #[error("班级冲突: 班级 {class_id} 在第{day}天第{hour}节已被教学块 {block_id} 占用")]
    ClassBusy {
        class_id: String,
        block_id: String,
        day: u8,
        hour: u8,
    },

    #[error("教室冲突: 教室 {room_id} 在第{day}天第{hour}节已被教学块 {block_id} 占用")]
    RoomBusy {
        room_id: String,
        block_id: String,
        day: u8,
        hour: u8,
    },

    #[error("教师课时超限: 教师 {teacher_id} {scope}课时上限为 {limit} 节")]
    TeacherOverCap {
        teacher_id: String,
        scope: CapScope,
        limit: u8,
    },
}

/// 课时上限口径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapScope {
    Daily,
    Weekly,
}

impl std::fmt::Display for CapScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapScope::Daily => write!(f, "日"),
            CapScope::Weekly => write!(f, "周"),
        }
    }
}

// ==========================================
// AvailabilityEvaluator - 可用性判定引擎
// ==========================================
pub struct AvailabilityEvaluator;

impl AvailabilityEvaluator {
    /// 实体在指定时段是否可用 (有效状态为开放)
    pub fn is_slot_available(
        snapshot: &ScheduleSnapshot,
        kind: EntityKind,
        entity_id: &str,
        slot: TimeSlot,
    ) -> bool {
        snapshot.effective_slot_state(kind, entity_id, slot).is_open()
    }

    /// 教学块以 (day, hour) 为起点的整个窗口, 时段状态是否全部开放
    ///
    /// 检查范围: 学校默认课表, 块所属班级, 块的全部教师
    /// (教室不参与封闭判定, 仅参与占用冲突)
    pub fn window_open_for_block(
        snapshot: &ScheduleSnapshot,
        block: &DistributionBlock,
        day: u8,
        hour: u8,
    ) -> Result<(), PlacementConflict> {
        let end = hour as u16 + block.duration as u16;
        for h in hour as u16..end {
            let slot = TimeSlot::new(day, h as u8);

            if !Self::is_slot_available(snapshot, EntityKind::School, "school", slot) {
                return Err(PlacementConflict::SlotClosed {
                    kind: EntityKind::School,
                    entity_id: "school".to_string(),
                    day,
                    hour: h as u8,
                });
            }

            if !Self::is_slot_available(snapshot, EntityKind::Class, &block.class_id, slot) {
                return Err(PlacementConflict::SlotClosed {
                    kind: EntityKind::Class,
                    entity_id: block.class_id.clone(),
                    day,
                    hour: h as u8,
                });
            }

            for teacher_id in &block.teacher_ids {
                if !Self::is_slot_available(snapshot, EntityKind::Teacher, teacher_id, slot) {
                    return Err(PlacementConflict::SlotClosed {
                        kind: EntityKind::Teacher,
                        entity_id: teacher_id.clone(),
                        day,
                        hour: h as u8,
                    });
                }
            }
        }
        Ok(())
    }

    /// 教学块能否以 (day, hour) 为起点落位
    ///
    /// # 检查项 (整个占用窗口)
    /// - 窗口在课表范围内
    /// - 学校/班级/全部教师时段开放
    /// - 教师/班级/教室无占用冲突 (被移动块自身除外)
    /// - 教师日/周课时上限 (配置了上限的教师)
    ///
    /// # 返回
    /// - `Ok(())`: 可落位
    /// - `Err(PlacementConflict)`: 第一条否决原因
    pub fn can_place_block(
        view: &PlacementView<'_>,
        block: &DistributionBlock,
        day: u8,
        hour: u8,
    ) -> Result<(), PlacementConflict> {
        let snapshot = view.snapshot();
        let settings = &snapshot.settings;

        // ===== 1. 窗口边界 =====
        let eff_max_hours = settings.effective_max_hours();
        if day == 0
            || hour == 0
            || block.duration == 0
            || day > settings.max_days
            || hour as u16 + block.duration as u16 - 1 > eff_max_hours as u16
        {
            return Err(PlacementConflict::OutOfBounds {
                day,
                hour,
                duration: block.duration,
            });
        }

        // ===== 2. 时段封闭判定 =====
        Self::window_open_for_block(snapshot, block, day, hour)?;

        // ===== 3. 占用冲突判定 =====
        for other in view.overlapping_blocks(block, day, hour) {
            if let Some(shared) = block.teacher_ids.iter().find(|t| other.involves_teacher(t)) {
                return Err(PlacementConflict::TeacherBusy {
                    teacher_id: shared.clone(),
                    block_id: other.block_id.clone(),
                    day,
                    hour,
                });
            }
            if block.class_id == other.class_id {
                return Err(PlacementConflict::ClassBusy {
                    class_id: block.class_id.clone(),
                    block_id: other.block_id.clone(),
                    day,
                    hour,
                });
            }
            if block.shares_room(other) {
                return Err(PlacementConflict::RoomBusy {
                    room_id: block.room_id.clone().unwrap_or_default(),
                    block_id: other.block_id.clone(),
                    day,
                    hour,
                });
            }
        }

        // ===== 4. 教师课时上限 =====
        let exclude = [block.block_id.as_str()];
        Self::teacher_caps_ok(view, block, day, &exclude)?;

        Ok(())
    }

    /// 教师日/周课时上限判定 (exclude 中的块视为不占课时)
    ///
    /// 级联搜索在挤出判定时将待挤出块一并排除
    pub fn teacher_caps_ok(
        view: &PlacementView<'_>,
        block: &DistributionBlock,
        day: u8,
        exclude: &[&str],
    ) -> Result<(), PlacementConflict> {
        let snapshot = view.snapshot();
        for teacher_id in &block.teacher_ids {
            let Some(teacher) = snapshot.teachers.get(teacher_id) else {
                continue;
            };
            if let Some(limit) = teacher.max_daily_hours {
                let used = view.teacher_hours_on_day(teacher_id, day, exclude);
                if used + block.duration as u16 > limit as u16 {
                    return Err(PlacementConflict::TeacherOverCap {
                        teacher_id: teacher_id.clone(),
                        scope: CapScope::Daily,
                        limit,
                    });
                }
            }
            if let Some(limit) = teacher.max_weekly_hours {
                let used = view.teacher_hours_in_week(teacher_id, exclude);
                if used + block.duration as u16 > limit as u16 {
                    return Err(PlacementConflict::TeacherOverCap {
                        teacher_id: teacher_id.clone(),
                        scope: CapScope::Weekly,
                        limit,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::school::{SchoolClass, SchoolSettings, Teacher};
    use crate::domain::types::{PlacementSource, SlotState};
    use chrono::Utc;
    use std::collections::HashMap;

    fn test_block(id: &str, class_id: &str, teachers: &[&str], day: u8, hour: u8, dur: u8) -> DistributionBlock {
        DistributionBlock {
            block_id: id.to_string(),
            class_id: class_id.to_string(),
            lesson_code: "MATH".to_string(),
            teacher_ids: teachers.iter().map(|t| t.to_string()).collect(),
            room_id: None,
            day: Some(day),
            hour: Some(hour),
            duration: dur,
            is_locked: false,
            is_placed: true,
            placement_source: PlacementSource::Calc,
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    fn test_snapshot() -> ScheduleSnapshot {
        let mut snapshot = ScheduleSnapshot::new(SchoolSettings::new(5, 8));
        snapshot
            .teachers
            .insert("T1".to_string(), Teacher::new("T1", "王老师"));
        snapshot
            .classes
            .insert("C1".to_string(), SchoolClass::new("C1", "一(1)班"));
        snapshot
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let snapshot = test_snapshot();
        let pending = HashMap::new();
        let view = PlacementView::new(&snapshot, &pending);
        let block = test_block("B1", "C1", &["T1"], 1, 1, 2);

        // 第6天不存在; 第8节起的2节窗口越界
        assert!(matches!(
            AvailabilityEvaluator::can_place_block(&view, &block, 6, 1),
            Err(PlacementConflict::OutOfBounds { .. })
        ));
        assert!(matches!(
            AvailabilityEvaluator::can_place_block(&view, &block, 1, 8),
            Err(PlacementConflict::OutOfBounds { .. })
        ));
        // 第7节起的2节窗口恰好贴边
        assert!(AvailabilityEvaluator::can_place_block(&view, &block, 1, 7).is_ok());
    }

    #[test]
    fn test_closed_slot_names_entity() {
        let mut snapshot = test_snapshot();
        if let Some(class) = snapshot.classes.get_mut("C1") {
            class
                .constraints
                .insert(TimeSlot::new(2, 3), SlotState::Closed);
        }
        let pending = HashMap::new();
        let view = PlacementView::new(&snapshot, &pending);
        let block = test_block("B1", "C1", &["T1"], 1, 1, 1);

        let err = AvailabilityEvaluator::can_place_block(&view, &block, 2, 3).unwrap_err();
        assert_eq!(
            err,
            PlacementConflict::SlotClosed {
                kind: EntityKind::Class,
                entity_id: "C1".to_string(),
                day: 2,
                hour: 3,
            }
        );
    }

    #[test]
    fn test_schedule_override_reopens_closed_slot() {
        let mut snapshot = test_snapshot();
        if let Some(teacher) = snapshot.teachers.get_mut("T1") {
            teacher
                .constraints
                .insert(TimeSlot::new(3, 2), SlotState::Closed);
            // 单元格覆盖重新开放
            teacher
                .schedule_overrides
                .insert("3_2".to_string(), SlotState::Open);
        }
        let pending = HashMap::new();
        let view = PlacementView::new(&snapshot, &pending);
        let block = test_block("B1", "C1", &["T1"], 1, 1, 1);

        assert!(AvailabilityEvaluator::can_place_block(&view, &block, 3, 2).is_ok());
    }

    #[test]
    fn test_teacher_conflict_excludes_moving_block() {
        let mut snapshot = test_snapshot();
        let b1 = test_block("B1", "C1", &["T1"], 1, 1, 2);
        let b2 = test_block("B2", "C2", &["T1"], 2, 1, 1);
        snapshot.blocks.insert(b1.block_id.clone(), b1.clone());
        snapshot.blocks.insert(b2.block_id.clone(), b2);
        let pending = HashMap::new();
        let view = PlacementView::new(&snapshot, &pending);

        // B1 移到自身当前窗口内不与自己冲突
        assert!(AvailabilityEvaluator::can_place_block(&view, &b1, 1, 2).is_ok());
        // 与 B2 的教师冲突被命名
        let err = AvailabilityEvaluator::can_place_block(&view, &b1, 2, 1).unwrap_err();
        assert!(matches!(
            err,
            PlacementConflict::TeacherBusy { ref teacher_id, ref block_id, .. }
                if teacher_id == "T1" && block_id == "B2"
        ));
    }

    #[test]
    fn test_pending_overlay_vacates_old_window() {
        let mut snapshot = test_snapshot();
        let b1 = test_block("B1", "C1", &["T1"], 1, 1, 1);
        let b2 = test_block("B2", "C2", &["T1"], 2, 1, 1);
        snapshot.blocks.insert(b1.block_id.clone(), b1.clone());
        snapshot.blocks.insert(b2.block_id.clone(), b2);

        // B2 待定迁往第3天 -> 其旧窗口 (第2天第1节) 对 T1 释放
        let mut pending = HashMap::new();
        pending.insert("B2".to_string(), TimeSlot::new(3, 1));
        let view = PlacementView::new(&snapshot, &pending);

        assert!(AvailabilityEvaluator::can_place_block(&view, &b1, 2, 1).is_ok());
        // 新窗口被占用
        let err = AvailabilityEvaluator::can_place_block(&view, &b1, 3, 1).unwrap_err();
        assert!(matches!(err, PlacementConflict::TeacherBusy { .. }));
    }

    #[test]
    fn test_daily_cap_enforced() {
        let mut snapshot = test_snapshot();
        if let Some(teacher) = snapshot.teachers.get_mut("T1") {
            teacher.max_daily_hours = Some(3);
        }
        let b1 = test_block("B1", "C1", &["T1"], 1, 1, 2);
        let b2 = test_block("B2", "C2", &["T1"], 1, 4, 1);
        snapshot.blocks.insert(b1.block_id.clone(), b1);
        snapshot.blocks.insert(b2.block_id.clone(), b2);

        let pending = HashMap::new();
        let view = PlacementView::new(&snapshot, &pending);
        let incoming = test_block("B3", "C3", &["T1"], 2, 1, 1);

        // 第1天 T1 已有3节, 再排1节超出日上限
        let err = AvailabilityEvaluator::can_place_block(&view, &incoming, 1, 6).unwrap_err();
        assert!(matches!(
            err,
            PlacementConflict::TeacherOverCap { scope: CapScope::Daily, limit: 3, .. }
        ));
        // 第2天无占用, 可落位
        assert!(AvailabilityEvaluator::can_place_block(&view, &incoming, 2, 1).is_ok());
    }
}
