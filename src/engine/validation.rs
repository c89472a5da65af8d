// ==========================================
// 学校排课系统 - 课表校验引擎
// ==========================================
// 依据: 调课引擎设计说明_v0.4.md - 4.4 校验评分服务
// 职责: 四维评分 + 问题清单 + 教师可用性热力图
// 红线: 只读快照, 不产生任何变更
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::block::DistributionBlock;
use crate::domain::snapshot::ScheduleSnapshot;
use crate::domain::types::{EntityKind, TimeSlot};
use crate::engine::availability::AvailabilityEvaluator;

// ==========================================
// ValidationScores - 四维评分 (0-100)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationScores {
    pub assignment_completeness: f64, // 分配完整度: 已落位块占比
    pub teacher_availability: f64,    // 教师可用性: 合规教师课时占比
    pub resource_balance: f64,        // 资源均衡度: 各日负载离散度
    pub schedule_feasibility: f64,    // 课表可行度: 零违规块占比
}

// ==========================================
// IssueCategory / ValidationIssue - 问题清单
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCategory {
    Unplaced,        // 未落位
    TeacherConflict, // 教师双重占用
    ClassConflict,   // 班级双重占用
    RoomConflict,    // 教室双重占用
    ClosedSlot,      // 封闭时段占用
    OutOfBounds,     // 窗口越界
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Unplaced => "UNPLACED",
            IssueCategory::TeacherConflict => "TEACHER_CONFLICT",
            IssueCategory::ClassConflict => "CLASS_CONFLICT",
            IssueCategory::RoomConflict => "ROOM_CONFLICT",
            IssueCategory::ClosedSlot => "CLOSED_SLOT",
            IssueCategory::OutOfBounds => "OUT_OF_BOUNDS",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: IssueCategory,
    pub block_id: Option<String>,         // 关联教学块 (可选)
    pub related_block_id: Option<String>, // 冲突对端教学块 (双重占用时)
    pub message: String,                  // 可读描述, 命名违规实体
}

// ==========================================
// HeatmapCell - 热力图单元格
// ==========================================
// available: 该时段空闲且可用的教师数; active: 该时段在授课的教师数
// 约定: 0/0 的单元格按中性空白渲染, 不视为冲突
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub available: u32,
    pub active: u32,
}

impl HeatmapCell {
    pub fn is_blank(&self) -> bool {
        self.available == 0 && self.active == 0
    }
}

impl fmt::Display for HeatmapCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            Ok(())
        } else {
            write!(f, "{}/{}", self.available, self.active)
        }
    }
}

// ==========================================
// ValidationReport - 校验报告
// ==========================================
// heatmap 下标: [day-1][hour-1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub scores: ValidationScores,
    pub issues: Vec<ValidationIssue>,
    pub heatmap: Vec<Vec<HeatmapCell>>,
}

// ==========================================
// ValidationEngine - 课表校验引擎
// ==========================================
pub struct ValidationEngine;

impl ValidationEngine {
    /// 校验整张课表快照
    pub fn validate(snapshot: &ScheduleSnapshot) -> ValidationReport {
        let issues = Self::collect_issues(snapshot);
        let scores = Self::compute_scores(snapshot, &issues);
        let heatmap = Self::build_heatmap(snapshot);

        ValidationReport {
            scores,
            issues,
            heatmap,
        }
    }

    /// 收集问题清单 (按块ID字典序遍历, 输出顺序稳定)
    fn collect_issues(snapshot: &ScheduleSnapshot) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let settings = &snapshot.settings;
        let eff_max_hours = settings.effective_max_hours();

        for block in snapshot.blocks.values() {
            let Some((day, hour)) = block.window() else {
                issues.push(ValidationIssue {
                    category: IssueCategory::Unplaced,
                    block_id: Some(block.block_id.clone()),
                    related_block_id: None,
                    message: format!("教学块 {} 尚未落位", block.block_id),
                });
                continue;
            };

            // 窗口越界
            if day == 0
                || hour == 0
                || day > settings.max_days
                || hour as u16 + block.duration as u16 - 1 > eff_max_hours as u16
            {
                issues.push(ValidationIssue {
                    category: IssueCategory::OutOfBounds,
                    block_id: Some(block.block_id.clone()),
                    related_block_id: None,
                    message: format!(
                        "教学块 {} 窗口越界: 第{}天第{}节起 {} 节",
                        block.block_id, day, hour, block.duration
                    ),
                });
                continue;
            }

            // 封闭时段占用
            if let Err(conflict) =
                AvailabilityEvaluator::window_open_for_block(snapshot, block, day, hour)
            {
                issues.push(ValidationIssue {
                    category: IssueCategory::ClosedSlot,
                    block_id: Some(block.block_id.clone()),
                    related_block_id: None,
                    message: format!("教学块 {} 占用封闭时段: {}", block.block_id, conflict),
                });
            }
        }

        // 双重占用 (逐对检查, i < j 保证每对只报一次)
        let placed: Vec<&DistributionBlock> = snapshot.placed_blocks().collect();
        for (i, a) in placed.iter().enumerate() {
            let (a_day, a_hour) = a.window().unwrap_or((0, 0));
            for b in placed.iter().skip(i + 1) {
                let (b_day, b_hour) = b.window().unwrap_or((0, 0));
                if !DistributionBlock::window_overlaps(
                    a_day, a_hour, a.duration, b_day, b_hour, b.duration,
                ) {
                    continue;
                }

                if let Some(shared) = a.teacher_ids.iter().find(|t| b.involves_teacher(t)) {
                    issues.push(ValidationIssue {
                        category: IssueCategory::TeacherConflict,
                        block_id: Some(a.block_id.clone()),
                        related_block_id: Some(b.block_id.clone()),
                        message: format!(
                            "教师 {} 双重占用: 教学块 {} 与 {}",
                            shared, a.block_id, b.block_id
                        ),
                    });
                }
                if a.class_id == b.class_id {
                    issues.push(ValidationIssue {
                        category: IssueCategory::ClassConflict,
                        block_id: Some(a.block_id.clone()),
                        related_block_id: Some(b.block_id.clone()),
                        message: format!(
                            "班级 {} 双重占用: 教学块 {} 与 {}",
                            a.class_id, a.block_id, b.block_id
                        ),
                    });
                }
                if a.shares_room(b) {
                    issues.push(ValidationIssue {
                        category: IssueCategory::RoomConflict,
                        block_id: Some(a.block_id.clone()),
                        related_block_id: Some(b.block_id.clone()),
                        message: format!(
                            "教室 {} 双重占用: 教学块 {} 与 {}",
                            a.room_id.clone().unwrap_or_default(),
                            a.block_id,
                            b.block_id
                        ),
                    });
                }
            }
        }

        issues
    }

    fn compute_scores(snapshot: &ScheduleSnapshot, issues: &[ValidationIssue]) -> ValidationScores {
        let total = snapshot.blocks.len();
        let placed: Vec<&DistributionBlock> = snapshot.placed_blocks().collect();

        // ----- 分配完整度 -----
        let assignment_completeness = if total == 0 {
            100.0
        } else {
            placed.len() as f64 / total as f64 * 100.0
        };

        // ----- 教师可用性: (教师, 时段) 占用恰好一次且时段开放 -----
        let mut teacher_slot_usage: HashMap<(String, TimeSlot), u32> = HashMap::new();
        for block in &placed {
            let (day, hour) = block.window().unwrap_or((0, 0));
            for h in hour..hour + block.duration {
                for t in &block.teacher_ids {
                    *teacher_slot_usage
                        .entry((t.clone(), TimeSlot::new(day, h)))
                        .or_insert(0) += 1;
                }
            }
        }
        let total_teacher_hours: u32 = teacher_slot_usage.values().sum();
        let ok_teacher_hours: u32 = teacher_slot_usage
            .iter()
            .filter(|((teacher_id, slot), count)| {
                **count == 1
                    && AvailabilityEvaluator::is_slot_available(
                        snapshot,
                        EntityKind::Teacher,
                        teacher_id,
                        *slot,
                    )
            })
            .map(|(_, count)| *count)
            .sum();
        let teacher_availability = if total_teacher_hours == 0 {
            100.0
        } else {
            ok_teacher_hours as f64 / total_teacher_hours as f64 * 100.0
        };

        // ----- 资源均衡度: 各日课时负载的变异系数 -----
        let mut day_load = vec![0f64; snapshot.settings.max_days as usize];
        for block in &placed {
            let (day, _) = block.window().unwrap_or((0, 0));
            if day >= 1 && day as usize <= day_load.len() {
                day_load[day as usize - 1] += block.duration as f64;
            }
        }
        let mean = if day_load.is_empty() {
            0.0
        } else {
            day_load.iter().sum::<f64>() / day_load.len() as f64
        };
        let resource_balance = if mean <= f64::EPSILON {
            100.0
        } else {
            let variance =
                day_load.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / day_load.len() as f64;
            let cv = variance.sqrt() / mean;
            (100.0 * (1.0 - cv)).clamp(0.0, 100.0)
        };

        // ----- 课表可行度: 零违规已落位块占比 -----
        let schedule_feasibility = if placed.is_empty() {
            100.0
        } else {
            let mut bad: std::collections::HashSet<&str> = std::collections::HashSet::new();
            for issue in issues {
                if issue.category == IssueCategory::Unplaced {
                    continue;
                }
                if let Some(id) = issue.block_id.as_deref() {
                    bad.insert(id);
                }
                if let Some(id) = issue.related_block_id.as_deref() {
                    bad.insert(id);
                }
            }
            let ok = placed.iter().filter(|b| !bad.contains(b.block_id.as_str())).count();
            ok as f64 / placed.len() as f64 * 100.0
        };

        ValidationScores {
            assignment_completeness,
            teacher_availability,
            resource_balance,
            schedule_feasibility,
        }
    }

    /// 教师可用性热力图: [day-1][hour-1] = 空闲可用数/在授课数
    fn build_heatmap(snapshot: &ScheduleSnapshot) -> Vec<Vec<HeatmapCell>> {
        let settings = &snapshot.settings;
        let eff_max_hours = settings.effective_max_hours();

        // 教师 -> 占用时段集合
        let mut busy: HashMap<&str, std::collections::HashSet<TimeSlot>> = HashMap::new();
        for block in snapshot.placed_blocks() {
            let (day, hour) = block.window().unwrap_or((0, 0));
            for h in hour..hour + block.duration {
                for t in &block.teacher_ids {
                    busy.entry(t.as_str())
                        .or_default()
                        .insert(TimeSlot::new(day, h));
                }
            }
        }

        let mut heatmap = Vec::with_capacity(settings.max_days as usize);
        for day in 1..=settings.max_days {
            let mut row = Vec::with_capacity(eff_max_hours as usize);
            for hour in 1..=eff_max_hours {
                let slot = TimeSlot::new(day, hour);
                let mut available = 0u32;
                let mut active = 0u32;
                for teacher_id in snapshot.teachers.keys() {
                    let is_busy = busy
                        .get(teacher_id.as_str())
                        .map(|s| s.contains(&slot))
                        .unwrap_or(false);
                    if is_busy {
                        active += 1;
                    } else if AvailabilityEvaluator::is_slot_available(
                        snapshot,
                        EntityKind::Teacher,
                        teacher_id,
                        slot,
                    ) {
                        available += 1;
                    }
                }
                row.push(HeatmapCell { available, active });
            }
            heatmap.push(row);
        }
        heatmap
    }
}
