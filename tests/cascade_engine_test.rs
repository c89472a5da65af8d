// ==========================================
// 级联调课引擎 - 集成测试
// ==========================================
// 口径: 整周课表上的复合级联场景与不变式校验
// ==========================================

#[path = "helpers/test_data_builder.rs"]
mod test_data_builder;

use test_data_builder::{build_snapshot, BlockBuilder, TeacherBuilder};

use school_timetable::domain::block::DistributionBlock;
use school_timetable::domain::snapshot::ScheduleSnapshot;
use school_timetable::domain::types::{EntityKind, TimeSlot};
use school_timetable::engine::cascade::{BlockMove, CascadeEngine, CascadeLimits, MoveFailure};

fn engine() -> CascadeEngine {
    CascadeEngine::new(CascadeLimits::default())
}

fn apply_changes(snapshot: &ScheduleSnapshot, changes: &[BlockMove]) -> ScheduleSnapshot {
    let mut applied = snapshot.clone();
    for change in changes {
        let block = applied.blocks.get_mut(&change.block_id).unwrap();
        block.day = Some(change.new_day);
        block.hour = Some(change.new_hour);
    }
    applied
}

fn assert_invariants(snapshot: &ScheduleSnapshot) {
    let placed: Vec<&DistributionBlock> = snapshot.placed_blocks().collect();
    for (i, a) in placed.iter().enumerate() {
        let (a_day, a_hour) = a.window().unwrap();

        assert!(a_day >= 1 && a_day <= snapshot.settings.max_days);
        assert!(
            a_hour as u16 + a.duration as u16 - 1
                <= snapshot.settings.effective_max_hours() as u16
        );

        for h in a_hour..a_hour + a.duration {
            let slot = TimeSlot::new(a_day, h);
            assert!(snapshot
                .effective_slot_state(EntityKind::Class, &a.class_id, slot)
                .is_open());
            for t in &a.teacher_ids {
                assert!(snapshot
                    .effective_slot_state(EntityKind::Teacher, t, slot)
                    .is_open());
            }
        }

        for b in placed.iter().skip(i + 1) {
            let (b_day, b_hour) = b.window().unwrap();
            if a.shares_resource(b) {
                assert!(
                    !DistributionBlock::window_overlaps(
                        a_day, a_hour, a.duration, b_day, b_hour, b.duration
                    ),
                    "教学块 {} 与 {} 资源重叠",
                    a.block_id,
                    b.block_id
                );
            }
        }
    }
}

// ==========================================
// 整周复合场景
// ==========================================

/// 整周课表: 三个班级, 四位教师, 含锁定块与封闭时段
fn full_week_snapshot() -> ScheduleSnapshot {
    let teachers = vec![
        TeacherBuilder::new("T1", "王老师").closed(5, 7).closed(5, 8).build(),
        TeacherBuilder::new("T2", "李老师").build(),
        TeacherBuilder::new("T3", "张老师").build(),
        TeacherBuilder::new("T4", "赵老师").build(),
    ];
    let blocks = vec![
        BlockBuilder::new("B01").class("C1").teachers(&["T1"]).at(1, 1).duration(2).build(),
        BlockBuilder::new("B02").class("C1").teachers(&["T2"]).at(1, 3).build(),
        BlockBuilder::new("B03").class("C1").teachers(&["T3"]).at(2, 1).build(),
        BlockBuilder::new("B04").class("C2").teachers(&["T1"]).at(2, 1).build(),
        BlockBuilder::new("B05").class("C2").teachers(&["T2"]).at(2, 2).locked().build(),
        BlockBuilder::new("B06").class("C2").teachers(&["T4"]).room("R1").at(3, 1).build(),
        BlockBuilder::new("B07").class("C3").teachers(&["T3"]).room("R1").at(3, 2).build(),
        BlockBuilder::new("B08").class("C3").teachers(&["T1", "T4"]).at(4, 1).build(),
    ];
    build_snapshot(5, 8, teachers, blocks)
}

#[test]
fn test_full_week_move_into_occupied_cell() {
    let snapshot = full_week_snapshot();

    // B01 (C1, T1, 2节连堂) 移往 (2,1): 同班 B03 与同教师 B04 均被挤出
    let result = engine().resolve_move(&snapshot, "B01", 2, 1);
    assert!(result.success, "{}", result.message);
    assert_eq!(result.changes[0].block_id, "B01");
    let moved: Vec<&str> = result.changes.iter().map(|c| c.block_id.as_str()).collect();
    assert!(moved.contains(&"B03"));
    assert!(moved.contains(&"B04"));

    let applied = apply_changes(&snapshot, &result.changes);
    assert_invariants(&applied);

    // 锁定块 B05 位置不变
    assert_eq!(applied.blocks["B05"].window(), Some((2, 2)));
}

#[test]
fn test_full_week_room_chain() {
    let snapshot = full_week_snapshot();

    // B06 (R1) 移往 B07 (R1) 所在时段, 教室冲突触发挤出
    let result = engine().resolve_move(&snapshot, "B06", 3, 2);
    assert!(result.success, "{}", result.message);
    assert!(result.changes.iter().any(|c| c.block_id == "B07"));

    assert_invariants(&apply_changes(&snapshot, &result.changes));
}

#[test]
fn test_full_week_closed_window_for_teacher() {
    let snapshot = full_week_snapshot();

    // (5,7) 对 T1 封闭
    let result = engine().resolve_move(&snapshot, "B01", 5, 7);
    assert!(!result.success);
    assert!(result.changes.is_empty());
    assert!(result.message.contains("T1"));
}

#[test]
fn test_full_week_determinism() {
    let snapshot = full_week_snapshot();
    let engine = engine();

    let runs: Vec<_> = (0..3)
        .map(|_| engine.resolve_move(&snapshot, "B01", 2, 1))
        .collect();
    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[1], runs[2]);
}

#[test]
fn test_full_week_snapshot_not_mutated() {
    let snapshot = full_week_snapshot();
    let windows_before: Vec<_> = snapshot
        .blocks
        .values()
        .map(|b| (b.block_id.clone(), b.window()))
        .collect();

    let _ = engine().resolve_move(&snapshot, "B01", 2, 1);

    let windows_after: Vec<_> = snapshot
        .blocks
        .values()
        .map(|b| (b.block_id.clone(), b.window()))
        .collect();
    assert_eq!(windows_before, windows_after);
}

// ==========================================
// 教师课时上限参与级联
// ==========================================

#[test]
fn test_weekly_cap_blocks_relocation() {
    // T2 周上限 1 节: 其教学块被挤出后无处可去 (任何新落位都不超限,
    // 但 T2 在 (1,1) 之外全部封闭, 构造唯一去处超日上限)
    let teachers = vec![TeacherBuilder::new("T2", "李老师").weekly_cap(1).build()];
    let b1 = BlockBuilder::new("B1").class("C1").teachers(&["T1"]).at(1, 1).build();
    // B2 与 B1 同班, 周上限 1 已被自身占用 -> 任意重落位仍是 1 节, 不超限
    let b2 = BlockBuilder::new("B2").class("C1").teachers(&["T2"]).at(1, 2).build();
    let snapshot = build_snapshot(2, 2, teachers, vec![b1, b2]);

    let result = engine().resolve_move(&snapshot, "B1", 1, 2);
    // 上限口径排除被移动块自身, B2 重落位不应被自己的课时顶出
    assert!(result.success, "{}", result.message);
    assert_invariants(&apply_changes(&snapshot, &result.changes));
}

// ==========================================
// 边界行为
// ==========================================

#[test]
fn test_extended_hour_via_open_default_cell() {
    // 默认课表在 (1,9) 显式开放 -> 第9节可用
    let mut snapshot = build_snapshot(
        5,
        8,
        vec![],
        vec![BlockBuilder::new("B1").class("C1").teachers(&["T1"]).at(1, 1).build()],
    );
    snapshot
        .settings
        .default_timetable
        .insert(TimeSlot::new(1, 9), school_timetable::SlotState::Open);

    let result = engine().resolve_move(&snapshot, "B1", 1, 9);
    assert!(result.success, "{}", result.message);

    // 其他日的第9节仍封闭
    let result = engine().resolve_move(&snapshot, "B1", 2, 9);
    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(MoveFailure::TargetClosed { .. })
    ));
}

#[test]
fn test_duration_window_must_fit_target() {
    let b1 = BlockBuilder::new("B1").class("C1").teachers(&["T1"]).at(1, 1).duration(3).build();
    let snapshot = build_snapshot(5, 8, vec![], vec![b1]);

    // 第7节起3节 (7,8,9) 越界
    let result = engine().resolve_move(&snapshot, "B1", 2, 7);
    assert!(!result.success);
    assert!(matches!(
        result.failure,
        Some(MoveFailure::TargetOutOfBounds { .. })
    ));

    // 第6节起3节 (6,7,8) 贴边可行
    let result = engine().resolve_move(&snapshot, "B1", 2, 6);
    assert!(result.success, "{}", result.message);
}
