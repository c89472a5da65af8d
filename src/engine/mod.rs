// ==========================================
// 学校排课系统 - 引擎层
// ==========================================
// 职责: 实现排课业务规则, 不拼 SQL
// 红线: 引擎只读快照, 所有否决/失败必须输出 reason
// ==========================================

pub mod analysis;
pub mod availability;
pub mod cascade;
pub mod validation;

// 重导出核心引擎
pub use analysis::{DependencyAnalyzer, RelationType, TeacherEdge, TeacherGraph, TeacherNode};
pub use availability::{AvailabilityEvaluator, CapScope, PlacementConflict};
pub use cascade::{BlockMove, CascadeEngine, CascadeLimits, MoveFailure, MoveResult};
pub use validation::{
    HeatmapCell, IssueCategory, ValidationEngine, ValidationIssue, ValidationReport,
    ValidationScores,
};
